//! Formatting utilities for AI responses in Discord.
//!
//! Discord rejects messages longer than 2000 characters and embed
//! descriptions longer than 4096, so long answers are split or truncated here
//! before they reach the Discord layer.

/// Maximum characters in a regular Discord message.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// Splits `text` into chunks of at most `limit` characters.
///
/// Breaks at the last newline inside the window when there is one, otherwise
/// at the last whitespace, otherwise mid-word. Chunks are trimmed and never
/// empty.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.chars().count() <= limit {
            chunks.push(rest.to_string());
            break;
        }

        // Byte offset just past the `limit`-th character.
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let window = &rest[..window_end];

        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(char::is_whitespace))
            .filter(|&idx| idx > 0)
            .unwrap_or(window_end);

        let chunk = rest[..cut].trim_end();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

/// Truncates to `limit` characters, appending "..." when something was cut.
pub fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(split_message("hello", 2000), vec!["hello"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(split_message("   \n ", 2000).is_empty());
    }

    #[test]
    fn test_prefers_newline_boundary() {
        let text = "first line\nsecond line";
        assert_eq!(split_message(text, 15), vec!["first line", "second line"]);
    }

    #[test]
    fn test_falls_back_to_space_then_hard_cut() {
        assert_eq!(split_message("aaaa bbbb", 6), vec!["aaaa", "bbbb"]);
        assert_eq!(split_message("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let text = "刹".repeat(2500);
        let chunks = split_message(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 2000);
        assert_eq!(chunks[1].chars().count(), 500);
    }

    #[test]
    fn test_every_chunk_within_limit() {
        let text = "word ".repeat(1000);
        for chunk in split_message(&text, 97) {
            assert!(chunk.chars().count() <= 97);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghijkl", 8), "abcde...");
    }
}
