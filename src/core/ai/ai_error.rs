use super::models::ProviderKind;
use thiserror::Error;

/// Failures surfaced by providers and the fallback chain.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("{provider} API error ({status}): {body}")]
    Http {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("{0} returned an empty answer")]
    EmptyResponse(ProviderKind),

    #[error("No API keys configured for {0}")]
    NoKeys(String),

    /// Error reported by something other than our own HTTP call, e.g. the
    /// image helper process. Only the message is known.
    #[error("{0}")]
    Remote(String),

    #[error("All providers failed: {}", .0.join("; "))]
    Exhausted(Vec<String>),
}

const KEY_FRAGMENTS: &[&str] = &[
    "api key",
    "api_key",
    "quota",
    "rate limit",
    "ratelimit",
    "resource_exhausted",
    "permission_denied",
    "unauthenticated",
];

impl AiError {
    /// Whether retrying with a different API key of the same provider could help.
    pub fn is_key_related(&self) -> bool {
        match self {
            AiError::Http { status, body, .. } => {
                matches!(status, 401 | 403 | 429) || mentions_key_problem(body)
            }
            AiError::Remote(message) => mentions_key_problem(message),
            _ => false,
        }
    }
}

fn mentions_key_problem(message: &str) -> bool {
    let lower = message.to_lowercase();
    if KEY_FRAGMENTS.iter().any(|f| lower.contains(f)) {
        return true;
    }
    // Helper processes only forward the message text, so look for the status codes too.
    ["(401", "(403", "(429", " 429 ", "status 429"]
        .iter()
        .any(|f| lower.contains(f))
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> AiError {
        AiError::Http {
            provider: ProviderKind::Groq,
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_auth_and_rate_limit_statuses_are_key_related() {
        assert!(http(401, "unauthorized").is_key_related());
        assert!(http(403, "forbidden").is_key_related());
        assert!(http(429, "slow down").is_key_related());
    }

    #[test]
    fn test_server_errors_are_not_key_related() {
        assert!(!http(500, "internal error").is_key_related());
        assert!(!http(503, "overloaded").is_key_related());
        assert!(!AiError::Transport("connection reset".into()).is_key_related());
    }

    #[test]
    fn test_body_mentioning_quota_is_key_related() {
        assert!(http(400, "API key not valid. Please pass a valid API key.").is_key_related());
        assert!(AiError::Remote("Gemini API error (429): Resource has been exhausted".into())
            .is_key_related());
        assert!(!AiError::Remote("No image data found in the response".into()).is_key_related());
    }
}
