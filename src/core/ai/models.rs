use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The hosted text-generation backends Setsuna can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    Gemini,
    #[serde(rename = "chatgpt")]
    ChatGpt,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Together,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Gemini,
        ProviderKind::Groq,
        ProviderKind::DeepSeek,
        ProviderKind::ChatGpt,
        ProviderKind::Together,
    ];

    /// Short identifier used in commands and the channel config file.
    pub fn id(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Gemini => "gemini",
            ProviderKind::ChatGpt => "chatgpt",
            ProviderKind::DeepSeek => "deepseek",
            ProviderKind::Together => "together",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "Groq",
            ProviderKind::Gemini => "Gemini",
            ProviderKind::ChatGpt => "ChatGPT",
            ProviderKind::DeepSeek => "DeepSeek",
            ProviderKind::Together => "Together AI",
        }
    }

    /// Prefix of the environment variables holding this provider's keys and model.
    pub fn env_prefix(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "GROQ",
            ProviderKind::Gemini => "GEMINI",
            ProviderKind::ChatGpt => "OPENAI",
            ProviderKind::DeepSeek => "DEEPSEEK",
            ProviderKind::Together => "TOGETHER",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "llama-3.3-70b-versatile",
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::ChatGpt => "gpt-4o-mini",
            ProviderKind::DeepSeek => "deepseek-chat",
            ProviderKind::Together => "meta-llama/Llama-3.3-70B-Instruct-Turbo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown provider '{}' (expected one of: gemini, groq, deepseek, chatgpt, together)",
            self.0
        )
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for ProviderKind {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(ProviderKind::Groq),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "chatgpt" | "openai" | "gpt" => Ok(ProviderKind::ChatGpt),
            "deepseek" => Ok(ProviderKind::DeepSeek),
            "together" | "togetherai" | "together-ai" => Ok(ProviderKind::Together),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Response from an AI provider, containing the main content and optional thinking.
///
/// Providers that expose their reasoning separately (Gemini thought parts,
/// DeepSeek `reasoning_content`) fill `thinking`; others leave it empty and
/// any inline `<think>` blocks are split out later by `AiService`.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    pub content: String,
    pub thinking: Option<String>,
}

/// Final response after processing by AiService.
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub answer: String,
    pub reasoning: Option<String>,
    /// The provider that actually answered, which may differ from the
    /// channel's preference after a fallback.
    pub provider: ProviderKind,
    pub model: String,
}

/// One conversation turn to be answered for a channel.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub preferred: ProviderKind,
    pub model_override: Option<String>,
    pub history: Vec<AiMessage>,
}
