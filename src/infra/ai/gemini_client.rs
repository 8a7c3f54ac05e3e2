// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements `AiProvider` for Gemini chat and exposes the two multimodal calls
// the imaging feature needs: image generation (response modalities TEXT +
// IMAGE) and vision (an image sent as an `inlineData` part next to a prompt).
//
// **Differences from the chat-completions providers:**
// - Authentication: API key is passed as a query parameter (`?key=API_KEY`)
//   rather than a Bearer token in the Authorization header.
// - Request format: Uses `contents[]` with nested `parts`, and `systemInstruction`
//   is a separate top-level field (not a message with role "system").
// - Response format: Content is at `candidates[0].content.parts[*]`, where each
//   part is either text or base64 `inlineData`.
//
// The key is not stored on the client: every call receives the key picked by
// the caller's `KeyRing`.

use crate::core::ai::{AiConfig, AiError, AiMessage, AiProvider, AiProviderResponse, ProviderKind};
use crate::core::imaging::ImageData;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================
//
// See: https://ai.google.dev/api/generate-content

/// Base64 payload of an image (or other blob) inside a part.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

/// A single part of content. Gemini uses a "parts" array to support
/// multimodal content; a part carries either text or inline data.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,

    /// Set by thinking models on parts that are reasoning, not the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct Content {
    /// "user" or "model" (Gemini uses "model" instead of "assistant")
    #[serde(skip_serializing_if = "String::is_empty")]
    role: String,
    parts: Vec<Part>,
}

/// See: https://ai.google.dev/api/generate-content#generationconfig
#[derive(Debug, Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,

    /// `["TEXT", "IMAGE"]` for image generation models.
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,

    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,

    /// Why the model stopped generating (e.g., "STOP", "SAFETY").
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

/// Text and images pulled out of one candidate.
#[derive(Debug, Default)]
pub struct GeminiOutput {
    /// The answer: the last non-thought text part.
    pub text: String,
    /// Every earlier text part, joined.
    pub thinking: Option<String>,
    pub images: Vec<ImageData>,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

pub struct GeminiClient {
    client: Client,
}

impl GeminiClient {
    pub fn new() -> Self {
        // Image generation is slow; give it more room than a chat reply.
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    fn text_part(text: impl Into<String>) -> Part {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn image_part(image: &ImageData) -> Part {
        Part {
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.bytes),
            }),
            ..Default::default()
        }
    }

    fn convert_message(msg: &AiMessage) -> Content {
        let role = match msg.role.as_str() {
            "assistant" => "model".to_string(),
            other => other.to_string(),
        };

        Content {
            role,
            parts: vec![Self::text_part(msg.content.clone())],
        }
    }

    fn build_chat_request(messages: &[AiMessage], config: &AiConfig) -> GenerateContentRequest {
        // Gemini takes the system prompt as a separate field; several system
        // messages are merged into one instruction.
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == "system")
            .map(|m| m.content.as_str())
            .collect();
        let system_instruction = (!system_text.is_empty()).then(|| Content {
            role: String::new(),
            parts: vec![Self::text_part(system_text.join("\n\n"))],
        });

        let contents = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(Self::convert_message)
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: Some(GenerationConfig {
                temperature: Some(config.temperature),
                max_output_tokens: config.max_tokens,
                top_p: config.top_p,
                ..Default::default()
            }),
        }
    }

    async fn generate_content(
        &self,
        api_key: &str,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GeminiOutput, AiError> {
        let url = format!("{}/{}:generateContent", API_BASE, model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AiError::Http {
                provider: ProviderKind::Gemini,
                status: status.as_u16(),
                body: Self::error_message(&body),
            });
        }

        Self::parse_output(&body)
    }

    fn error_message(body: &str) -> String {
        match serde_json::from_str::<GeminiErrorResponse>(body) {
            Ok(parsed) => match parsed.error.status {
                Some(status) => format!("{} ({})", parsed.error.message, status),
                None => parsed.error.message,
            },
            Err(_) => body.chars().take(500).collect(),
        }
    }

    fn parse_output(body: &str) -> Result<GeminiOutput, AiError> {
        let response: GenerateContentResponse = serde_json::from_str(body)?;

        let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(AiError::InvalidResponse(format!(
                "No content in Gemini response ({}) - the model may have been blocked by safety filters",
                reason
            )));
        };

        let mut texts = Vec::new();
        let mut thoughts = Vec::new();
        let mut images = Vec::new();

        for part in candidate.content.parts {
            if let Some(inline) = part.inline_data {
                match STANDARD.decode(inline.data.trim()) {
                    Ok(bytes) => images.push(ImageData {
                        bytes,
                        mime_type: inline.mime_type,
                    }),
                    Err(e) => tracing::warn!("Skipping undecodable inline image: {}", e),
                }
            } else if let Some(text) = part.text {
                if part.thought.unwrap_or(false) {
                    thoughts.push(text);
                } else {
                    texts.push(text);
                }
            }
        }

        // With several text parts, everything before the last one is thinking.
        let text = texts.pop().unwrap_or_default();
        thoughts.extend(texts);
        let thinking = Some(thoughts.join("\n\n")).filter(|t| !t.trim().is_empty());

        if text.is_empty() && images.is_empty() {
            if let Some(reason) = candidate.finish_reason.filter(|r| r != "STOP") {
                tracing::warn!("Gemini stopped without output: {}", reason);
            }
        }

        Ok(GeminiOutput {
            text,
            thinking,
            images,
        })
    }

    /// Generates an image from `prompt`, optionally restyling `source`.
    pub async fn generate_image(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        source: Option<&ImageData>,
    ) -> Result<GeminiOutput, AiError> {
        let mut parts = vec![Self::text_part(prompt)];
        if let Some(source) = source {
            parts.push(Self::image_part(source));
        }

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: Some(0.7),
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
                ..Default::default()
            }),
        };

        tracing::debug!(model, with_source = source.is_some(), "Gemini image request");
        self.generate_content(api_key, model, &request).await
    }

    /// Asks a vision model about one image.
    pub async fn analyze_image(
        &self,
        api_key: &str,
        model: &str,
        prompt: &str,
        image: &ImageData,
        temperature: f32,
    ) -> Result<String, AiError> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Self::text_part(prompt), Self::image_part(image)],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                temperature: Some(temperature),
                max_output_tokens: Some(2048),
                top_p: Some(1.0),
                top_k: Some(32),
                response_modalities: None,
            }),
        };

        let output = self.generate_content(api_key, model, &request).await?;
        let text = output.text.trim().to_string();
        if text.is_empty() {
            return Err(AiError::EmptyResponse(ProviderKind::Gemini));
        }
        Ok(text)
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn chat_complete(
        &self,
        api_key: &str,
        messages: &[AiMessage],
        config: &AiConfig,
    ) -> Result<AiProviderResponse, AiError> {
        let request = Self::build_chat_request(messages, config);

        // Never log the key; it lives in the query string.
        tracing::debug!(
            "Gemini request to model {}: {} messages",
            config.model,
            messages.len()
        );

        let output = self.generate_content(api_key, &config.model, &request).await?;

        tracing::debug!(
            "Gemini response received: {} chars content, {} chars thinking",
            output.text.len(),
            output.thinking.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        Ok(AiProviderResponse {
            content: output.text,
            thinking: output.thinking,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_message_user() {
        let content = GeminiClient::convert_message(&AiMessage::user("Hello!"));

        assert_eq!(content.role, "user");
        assert_eq!(content.parts.len(), 1);
        assert_eq!(content.parts[0].text, Some("Hello!".to_string()));
    }

    #[test]
    fn test_convert_message_assistant_to_model() {
        let content = GeminiClient::convert_message(&AiMessage::assistant("Hi there!"));

        // Gemini uses "model" instead of "assistant"
        assert_eq!(content.role, "model");
        assert_eq!(content.parts[0].text, Some("Hi there!".to_string()));
    }

    #[test]
    fn test_system_messages_become_instruction() {
        let config = AiConfig {
            model: "gemini-2.0-flash".into(),
            temperature: 0.7,
            max_tokens: Some(1000),
            top_p: None,
        };
        let request = GeminiClient::build_chat_request(
            &[AiMessage::system("persona"), AiMessage::user("Alice: hi")],
            &config,
        );

        assert_eq!(request.contents.len(), 1);
        let instruction = request.system_instruction.unwrap();
        assert_eq!(instruction.parts[0].text.as_deref(), Some("persona"));

        let json = serde_json::to_value(&request.generation_config).unwrap();
        assert_eq!(json["maxOutputTokens"], 1000);
        assert!(json.get("topP").is_none());
        assert!(json.get("responseModalities").is_none());
    }

    #[test]
    fn test_generation_config_serialization() {
        let config = GenerationConfig {
            temperature: Some(0.7),
            max_output_tokens: Some(1000),
            top_p: Some(0.9),
            top_k: None,
            response_modalities: Some(vec!["TEXT".into(), "IMAGE".into()]),
        };

        let json = serde_json::to_string(&config).unwrap();

        assert!(json.contains("\"maxOutputTokens\""));
        assert!(json.contains("\"topP\""));
        assert!(json.contains("\"responseModalities\":[\"TEXT\",\"IMAGE\"]"));
        assert!(!json.contains("topK"));
    }

    #[test]
    fn test_image_part_serializes_inline_data() {
        let part = GeminiClient::image_part(&ImageData {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".into(),
        });
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inlineData"]["mimeType"], "image/png");
        assert_eq!(json["inlineData"]["data"], "AQID");
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_parse_output_splits_thinking_and_images() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "let me think"},
                    {"text": "Here is your cat"},
                    {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                ]},
                "finishReason": "STOP"
            }]
        }"#;
        let output = GeminiClient::parse_output(body).unwrap();

        assert_eq!(output.text, "Here is your cat");
        assert_eq!(output.thinking.as_deref(), Some("let me think"));
        assert_eq!(output.images.len(), 1);
        assert_eq!(output.images[0].bytes, vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_output_blocked_prompt() {
        let body = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        match GeminiClient::parse_output(body) {
            Err(AiError::InvalidResponse(msg)) => assert!(msg.contains("SAFETY")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_error_message_includes_status() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            GeminiClient::error_message(body),
            "Resource has been exhausted (RESOURCE_EXHAUSTED)"
        );
    }
}
