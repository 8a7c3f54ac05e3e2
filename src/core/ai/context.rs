// =============================================================================
// CONTEXT SELECTION MODULE
// =============================================================================
//
// Turns recent channel history into the message list sent to a provider.
// Instead of forwarding every fetched message, it:
// 1. Always keeps the most recent messages (they're most relevant)
// 2. Fills the remaining token budget walking backwards in time
// 3. Returns messages in chronological order

use super::models::AiMessage;

// =============================================================================
// CONTEXT MESSAGE
// =============================================================================

/// A channel message reduced to what the provider needs.
#[derive(Debug, Clone)]
pub struct ContextMessage {
    /// Role: "user" or "assistant"
    pub role: String,
    /// The message content
    pub content: String,
    /// Unix timestamp (for ordering)
    pub timestamp: i64,
    /// Display name of the author (for user messages)
    pub author_name: String,
}

impl ContextMessage {
    pub fn new(role: String, content: String, timestamp: i64, author_name: String) -> Self {
        Self {
            role,
            content,
            timestamp,
            author_name,
        }
    }

    /// Converts to an AiMessage for the API
    pub fn to_ai_message(&self) -> AiMessage {
        let content = if self.role == "user" && !self.author_name.is_empty() {
            format!("{}: {}", self.author_name, self.content)
        } else {
            self.content.clone()
        };

        match self.role.as_str() {
            "assistant" => AiMessage::assistant(content),
            "system" => AiMessage::system(content),
            _ => AiMessage::user(content),
        }
    }
}

// =============================================================================
// TOKEN ESTIMATION
// =============================================================================

/// Estimates the number of tokens in a text string.
///
/// Uses a simple heuristic: ~4 bytes per token. CJK text is three bytes per
/// character in UTF-8, which lands close to the real tokenizer ratio too.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}

// =============================================================================
// CONTEXT SELECTOR
// =============================================================================

#[derive(Debug, Clone)]
pub struct ContextSelector {
    /// Maximum token budget for context (default: 8000)
    pub max_tokens: usize,
    /// Number of recent messages to always keep (default: 5)
    pub always_keep_recent: usize,
}

impl Default for ContextSelector {
    fn default() -> Self {
        Self {
            max_tokens: 8000,
            always_keep_recent: 5,
        }
    }
}

impl ContextSelector {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Default::default()
        }
    }

    /// Selects messages within the token budget.
    ///
    /// Messages with blank content are dropped first. The newest
    /// `always_keep_recent` messages are always kept; older ones are added
    /// newest-first while they fit.
    pub fn select(&self, messages: Vec<ContextMessage>) -> Vec<AiMessage> {
        let mut sorted: Vec<ContextMessage> = messages
            .into_iter()
            .filter(|m| !m.content.trim().is_empty())
            .collect();
        if sorted.is_empty() {
            return Vec::new();
        }
        sorted.sort_by_key(|m| m.timestamp);

        let split_point = sorted.len().saturating_sub(self.always_keep_recent);
        let (older, must_keep) = sorted.split_at(split_point);

        let mut used_tokens: usize = must_keep
            .iter()
            .map(|m| estimate_tokens(&m.to_ai_message().content))
            .sum();

        let mut taken = 0;
        for msg in older.iter().rev() {
            let cost = estimate_tokens(&msg.to_ai_message().content);
            if used_tokens + cost > self.max_tokens {
                break;
            }
            used_tokens += cost;
            taken += 1;
        }

        older[older.len() - taken..]
            .iter()
            .chain(must_keep.iter())
            .map(ContextMessage::to_ai_message)
            .collect()
    }
}
