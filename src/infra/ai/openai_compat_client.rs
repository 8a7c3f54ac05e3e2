// Client for the providers that speak the OpenAI chat-completions dialect:
// Groq, ChatGPT, DeepSeek and Together AI. Only the endpoint differs.

use crate::core::ai::{AiConfig, AiError, AiMessage, AiProvider, AiProviderResponse, ProviderKind};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    /// DeepSeek reasoner models return their chain of thought separately.
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

pub struct OpenAiCompatClient {
    client: Client,
    kind: ProviderKind,
    endpoint: String,
}

impl OpenAiCompatClient {
    pub fn new(kind: ProviderKind) -> Result<Self, AiError> {
        let endpoint = Self::endpoint_for(kind).ok_or_else(|| {
            AiError::InvalidResponse(format!("{} does not use the chat-completions API", kind))
        })?;
        Ok(Self::with_endpoint(kind, endpoint))
    }

    pub fn with_endpoint(kind: ProviderKind, endpoint: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            kind,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint_for(kind: ProviderKind) -> Option<&'static str> {
        match kind {
            ProviderKind::Groq => Some("https://api.groq.com/openai/v1/chat/completions"),
            ProviderKind::ChatGpt => Some("https://api.openai.com/v1/chat/completions"),
            ProviderKind::DeepSeek => Some("https://api.deepseek.com/v1/chat/completions"),
            ProviderKind::Together => Some("https://api.together.xyz/v1/chat/completions"),
            ProviderKind::Gemini => None,
        }
    }

    fn payload(messages: &[AiMessage], config: &AiConfig) -> serde_json::Value {
        let mut payload = json!({
            "model": config.model,
            "messages": messages,
            "temperature": config.temperature,
        });
        if let Some(max_tokens) = config.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        if let Some(top_p) = config.top_p {
            payload["top_p"] = json!(top_p);
        }
        payload
    }

    fn error_message(body: &str) -> String {
        serde_json::from_str::<ErrorResponse>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.chars().take(500).collect())
    }

    fn parse_completion(kind: ProviderKind, body: &str) -> Result<AiProviderResponse, AiError> {
        let response: ChatCompletionResponse = serde_json::from_str(body)?;
        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or(AiError::EmptyResponse(kind))?;

        Ok(AiProviderResponse {
            content: message.content.unwrap_or_default(),
            thinking: message
                .reasoning_content
                .filter(|r| !r.trim().is_empty()),
        })
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatClient {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn chat_complete(
        &self,
        api_key: &str,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, AiError> {
        tracing::debug!(
            provider = %self.kind,
            model = %config.model,
            messages = messages.len(),
            "Sending chat completion"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("Content-Type", "application/json")
            .json(&Self::payload(messages, config))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AiError::Http {
                provider: self.kind,
                status: status.as_u16(),
                body: Self::error_message(&body),
            });
        }

        Self::parse_completion(self.kind, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_skips_unset_options() {
        let config = AiConfig {
            model: "llama-3.3-70b-versatile".into(),
            temperature: 0.7,
            max_tokens: Some(1000),
            top_p: None,
        };
        let payload = OpenAiCompatClient::payload(&[AiMessage::user("hi")], &config);

        assert_eq!(payload["model"], "llama-3.3-70b-versatile");
        assert_eq!(payload["max_tokens"], 1000);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert!(payload.get("top_p").is_none());
    }

    #[test]
    fn test_parse_completion_with_reasoning() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"42","reasoning_content":"thinking hard"}}]}"#;
        let parsed = OpenAiCompatClient::parse_completion(ProviderKind::DeepSeek, body).unwrap();
        assert_eq!(parsed.content, "42");
        assert_eq!(parsed.thinking.as_deref(), Some("thinking hard"));
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let err = OpenAiCompatClient::parse_completion(ProviderKind::Groq, r#"{"choices":[]}"#)
            .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse(ProviderKind::Groq)));
    }

    #[test]
    fn test_error_message_prefers_provider_text() {
        let body = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#;
        assert_eq!(OpenAiCompatClient::error_message(body), "Invalid API Key");
        assert_eq!(OpenAiCompatClient::error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_gemini_has_no_compat_endpoint() {
        assert!(OpenAiCompatClient::new(ProviderKind::Gemini).is_err());
        assert!(OpenAiCompatClient::new(ProviderKind::Together).is_ok());
    }
}
