use super::ai_error::AiError;
use super::key_ring::KeyRing;
use super::models::{AiConfig, AiMessage, AiProviderResponse, AiResponse, ChatRequest, ProviderKind};
use super::persona;
use async_trait::async_trait;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait AiProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Sends a chat completion request using the given API key.
    ///
    /// Returns an `AiProviderResponse` containing both the main content
    /// and optional thinking/reasoning from the model.
    async fn chat_complete(
        &self,
        api_key: &str,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, AiError>;
}

/// Generation knobs shared by every provider plus the fallback policy.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Providers tried, in order, after the channel's preferred one fails.
    pub fallback_order: Vec<ProviderKind>,
    pub timezone: Tz,
}

struct ProviderSlot {
    provider: Arc<dyn AiProvider>,
    keys: Arc<KeyRing>,
    model: String,
}

pub struct AiService {
    slots: HashMap<ProviderKind, ProviderSlot>,
    persona: String,
    settings: ChatSettings,
}

impl AiService {
    pub fn new(persona: String, settings: ChatSettings) -> Self {
        Self {
            slots: HashMap::new(),
            persona,
            settings,
        }
    }

    /// Registers a provider with its key ring and default model.
    /// Registering the same kind twice replaces the earlier slot.
    pub fn register(&mut self, provider: Arc<dyn AiProvider>, keys: Arc<KeyRing>, model: String) {
        let kind = provider.kind();
        tracing::info!(
            provider = %kind,
            keys = keys.len(),
            model = %model,
            "Registered AI provider"
        );
        self.slots.insert(
            kind,
            ProviderSlot {
                provider,
                keys,
                model,
            },
        );
    }

    pub fn is_available(&self, kind: ProviderKind) -> bool {
        self.slots
            .get(&kind)
            .map(|slot| !slot.keys.is_empty())
            .unwrap_or(false)
    }

    /// Providers that have at least one key, in canonical order.
    pub fn available(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    pub fn key_count(&self, kind: ProviderKind) -> usize {
        self.slots.get(&kind).map(|s| s.keys.len()).unwrap_or(0)
    }

    pub fn default_model(&self, kind: ProviderKind) -> Option<&str> {
        self.slots.get(&kind).map(|s| s.model.as_str())
    }

    /// The order in which providers are tried for a channel preferring `preferred`.
    pub fn provider_chain(&self, preferred: ProviderKind) -> Vec<ProviderKind> {
        let mut chain = Vec::new();
        for kind in std::iter::once(preferred).chain(self.settings.fallback_order.iter().copied()) {
            if chain.contains(&kind) || !self.is_available(kind) {
                continue;
            }
            chain.push(kind);
        }
        chain
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        let system = persona::system_prompt(
            &self.persona,
            self.settings.timezone,
            chrono::Utc::now(),
        );

        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(AiMessage::system(system));
        messages.extend(request.history.iter().cloned());

        let chain = self.provider_chain(request.preferred);
        if chain.is_empty() {
            return Err(AiError::NoKeys(request.preferred.display_name().to_string()));
        }

        let mut failures = Vec::new();
        for kind in chain {
            let Some(slot) = self.slots.get(&kind) else {
                continue;
            };

            let model = if kind == request.preferred {
                request
                    .model_override
                    .clone()
                    .unwrap_or_else(|| slot.model.clone())
            } else {
                slot.model.clone()
            };

            let config = AiConfig {
                model: model.clone(),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                top_p: self.settings.top_p,
            };

            let result = slot
                .keys
                .with_rotation(|key| {
                    let provider = Arc::clone(&slot.provider);
                    let messages = &messages;
                    let config = &config;
                    async move { provider.chat_complete(&key, messages, config).await }
                })
                .await;

            match result {
                Ok(provider_response) => {
                    let (answer, tagged_reasoning) = Self::parse_response(&provider_response.content);
                    if answer.is_empty() {
                        tracing::warn!(provider = %kind, model = %model, "Provider returned an empty answer");
                        failures.push(AiError::EmptyResponse(kind).to_string());
                        continue;
                    }

                    if kind != request.preferred {
                        tracing::info!(
                            preferred = %request.preferred,
                            used = %kind,
                            "Answered by fallback provider"
                        );
                    }

                    // Prefer the provider's own thinking over tags parsed out of the text
                    let reasoning = provider_response.thinking.or(tagged_reasoning);
                    return Ok(AiResponse {
                        answer,
                        reasoning,
                        provider: kind,
                        model,
                    });
                }
                Err(err) => {
                    tracing::warn!(provider = %kind, model = %model, "Provider failed: {}", err);
                    failures.push(format!("{}: {}", kind, err));
                }
            }
        }

        Err(AiError::Exhausted(failures))
    }

    /// Splits reasoning markup from the visible answer.
    ///
    /// Handles `<think>` blocks emitted by R1-style models as well as the
    /// `<answer>`/`<rationale>` convention some prompts ask for.
    fn parse_response(content: &str) -> (String, Option<String>) {
        let mut answer = content.to_string();
        let mut reasoning = None;

        if let Some(start) = answer.find("<think>") {
            match answer[start..].find("</think>") {
                Some(rel_end) => {
                    let end = start + rel_end;
                    let thought = answer[start + 7..end].trim().to_string();
                    answer = format!("{}{}", &answer[..start], &answer[end + 8..]);
                    if !thought.is_empty() {
                        reasoning = Some(thought);
                    }
                }
                None => {
                    // Cut off mid-thought: nothing usable left to show.
                    let thought = answer[start + 7..].trim().to_string();
                    answer.truncate(start);
                    if !thought.is_empty() {
                        reasoning = Some(thought);
                    }
                }
            }
        }

        if let (Some(start), Some(end)) = (answer.find("<rationale>"), answer.find("</rationale>")) {
            if end > start {
                reasoning = Some(answer[start + 11..end].trim().to_string());
                answer = format!("{}{}", &answer[..start], &answer[end + 12..]);
            }
        }

        if let (Some(start), Some(end)) = (answer.find("<answer>"), answer.find("</answer>")) {
            if end > start {
                answer = answer[start + 8..end].to_string();
            }
        }

        (answer.trim().to_string(), reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Provider that replays a scripted outcome per API key.
    struct ScriptedProvider {
        kind: ProviderKind,
        outcomes: HashMap<String, Result<String, u16>>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl ScriptedProvider {
        fn new(kind: ProviderKind, outcomes: &[(&str, Result<&str, u16>)]) -> Arc<Self> {
            Arc::new(Self {
                kind,
                outcomes: outcomes
                    .iter()
                    .map(|(k, v)| (k.to_string(), (*v).map(|s| s.to_string())))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn chat_complete(
            &self,
            api_key: &str,
            messages: &[AiMessage],
            config: &AiConfig,
        ) -> Result<AiProviderResponse, AiError> {
            assert_eq!(messages[0].role, "system");
            self.calls
                .lock()
                .unwrap()
                .push((api_key.to_string(), config.model.clone()));
            match self.outcomes.get(api_key) {
                Some(Ok(text)) => Ok(AiProviderResponse {
                    content: text.clone(),
                    thinking: None,
                }),
                Some(Err(status)) => Err(AiError::Http {
                    provider: self.kind,
                    status: *status,
                    body: "scripted failure".to_string(),
                }),
                None => Err(AiError::Transport("unknown key".to_string())),
            }
        }
    }

    fn settings() -> ChatSettings {
        ChatSettings {
            temperature: 0.7,
            max_tokens: Some(1000),
            top_p: None,
            fallback_order: vec![
                ProviderKind::Gemini,
                ProviderKind::Groq,
                ProviderKind::DeepSeek,
            ],
            timezone: chrono_tz::Asia::Taipei,
        }
    }

    fn keys(label: &str, keys: &[&str]) -> Arc<KeyRing> {
        Arc::new(KeyRing::new(
            label,
            keys.iter().map(|k| k.to_string()).collect(),
        ))
    }

    fn request(preferred: ProviderKind) -> ChatRequest {
        ChatRequest {
            preferred,
            model_override: None,
            history: vec![AiMessage::user("Alice: hi")],
        }
    }

    #[test]
    fn test_provider_chain_skips_unavailable_and_duplicates() {
        let mut service = AiService::new("p".into(), settings());
        service.register(
            ScriptedProvider::new(ProviderKind::Gemini, &[]),
            keys("gemini", &["g"]),
            "gemini-2.0-flash".into(),
        );
        service.register(
            ScriptedProvider::new(ProviderKind::Groq, &[]),
            keys("groq", &[]),
            "llama".into(),
        );
        service.register(
            ScriptedProvider::new(ProviderKind::DeepSeek, &[]),
            keys("deepseek", &["d"]),
            "deepseek-chat".into(),
        );

        assert_eq!(
            service.provider_chain(ProviderKind::DeepSeek),
            vec![ProviderKind::DeepSeek, ProviderKind::Gemini]
        );
        assert_eq!(
            service.available(),
            vec![ProviderKind::Gemini, ProviderKind::DeepSeek]
        );
    }

    #[tokio::test]
    async fn test_preferred_provider_answers_with_model_override() {
        let gemini = ScriptedProvider::new(ProviderKind::Gemini, &[("g1", Ok("hello!"))]);
        let mut service = AiService::new("p".into(), settings());
        service.register(gemini.clone(), keys("gemini", &["g1"]), "gemini-2.0-flash".into());

        let mut req = request(ProviderKind::Gemini);
        req.model_override = Some("gemini-2.5-pro".into());
        let response = service.chat(req).await.unwrap();

        assert_eq!(response.answer, "hello!");
        assert_eq!(response.provider, ProviderKind::Gemini);
        assert_eq!(response.model, "gemini-2.5-pro");
        assert_eq!(gemini.calls(), vec![("g1".into(), "gemini-2.5-pro".into())]);
    }

    #[tokio::test]
    async fn test_rotates_keys_before_falling_back() {
        let gemini = ScriptedProvider::new(
            ProviderKind::Gemini,
            &[("g1", Err(429)), ("g2", Ok("from second key"))],
        );
        let mut service = AiService::new("p".into(), settings());
        service.register(gemini.clone(), keys("gemini", &["g1", "g2"]), "m".into());

        let response = service.chat(request(ProviderKind::Gemini)).await.unwrap();
        assert_eq!(response.answer, "from second key");
        assert_eq!(gemini.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider_on_server_error() {
        let gemini = ScriptedProvider::new(ProviderKind::Gemini, &[("g1", Err(503))]);
        let groq = ScriptedProvider::new(ProviderKind::Groq, &[("q1", Ok("groq here"))]);
        let mut service = AiService::new("p".into(), settings());
        service.register(gemini.clone(), keys("gemini", &["g1", "g2"]), "gm".into());
        service.register(groq.clone(), keys("groq", &["q1"]), "qm".into());

        let mut req = request(ProviderKind::Gemini);
        req.model_override = Some("custom".into());
        let response = service.chat(req).await.unwrap();

        assert_eq!(response.answer, "groq here");
        assert_eq!(response.provider, ProviderKind::Groq);
        // The override only applies to the preferred provider.
        assert_eq!(response.model, "qm");
        // 503 is not a key problem, so the second Gemini key is never tried.
        assert_eq!(gemini.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let gemini = ScriptedProvider::new(ProviderKind::Gemini, &[("g1", Err(500))]);
        let groq = ScriptedProvider::new(ProviderKind::Groq, &[("q1", Ok("   "))]);
        let mut service = AiService::new("p".into(), settings());
        service.register(gemini, keys("gemini", &["g1"]), "gm".into());
        service.register(groq, keys("groq", &["q1"]), "qm".into());

        let err = service.chat(request(ProviderKind::Gemini)).await.unwrap_err();
        match err {
            AiError::Exhausted(failures) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_available_provider() {
        let service = AiService::new("p".into(), settings());
        let err = service.chat(request(ProviderKind::Groq)).await.unwrap_err();
        assert!(matches!(err, AiError::NoKeys(_)));
    }

    #[test]
    fn test_parse_think_block() {
        let (answer, reasoning) =
            AiService::parse_response("<think>\nuser greets me\n</think>\n\nHi there!");
        assert_eq!(answer, "Hi there!");
        assert_eq!(reasoning.as_deref(), Some("user greets me"));
    }

    #[test]
    fn test_parse_unterminated_think_leaves_no_answer() {
        let (answer, reasoning) = AiService::parse_response("<think>still going");
        assert!(answer.is_empty());
        assert_eq!(reasoning.as_deref(), Some("still going"));
    }

    #[test]
    fn test_parse_answer_and_rationale_tags() {
        let (answer, reasoning) = AiService::parse_response(
            "<rationale>because</rationale><answer> 42 </answer>",
        );
        assert_eq!(answer, "42");
        assert_eq!(reasoning.as_deref(), Some("because"));
    }

    #[test]
    fn test_parse_plain_text() {
        let (answer, reasoning) = AiService::parse_response("  just text ");
        assert_eq!(answer, "just text");
        assert!(reasoning.is_none());
    }
}
