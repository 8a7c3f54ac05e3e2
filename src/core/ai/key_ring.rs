// Round-robin API key rotation.
//
// Every provider can be configured with several keys. The ring remembers which
// key is "current" across requests; a key that fails with an auth/quota error
// is rotated out and the next request starts from its successor.

use super::ai_error::AiError;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug)]
pub struct KeyRing {
    label: String,
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRing {
    pub fn new(label: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            label: label.into(),
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Moves the shared cursor past `idx`, unless another request already did.
    /// Returns the index the cursor now points at.
    fn retire(&self, idx: usize) -> usize {
        let len = self.keys.len();
        let _ = self
            .cursor
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |cur| {
                (cur % len == idx).then_some((idx + 1) % len)
            });
        self.cursor.load(Ordering::Relaxed) % len
    }

    /// Masks a key for logs: `abcd...wxyz`.
    pub fn masked(key: &str) -> String {
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 8 {
            return "****".to_string();
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// Runs `call` starting from the current key, walking the ring on
    /// key-related failures. Each key is tried at most once per invocation,
    /// whatever concurrent callers do to the shared cursor.
    pub async fn with_rotation<T, F, Fut>(&self, mut call: F) -> Result<T, AiError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, AiError>>,
    {
        let len = self.keys.len();
        if len == 0 {
            return Err(AiError::NoKeys(self.label.clone()));
        }

        let start = self.cursor.load(Ordering::Relaxed) % len;
        let mut last_error = None;
        for offset in 0..len {
            let idx = (start + offset) % len;
            let key = &self.keys[idx];

            match call(key.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_key_related() => {
                    let next = self.retire(idx);
                    tracing::warn!(
                        ring = %self.label,
                        key = %Self::masked(key),
                        attempt = offset + 1,
                        next_index = next,
                        "Key rejected, rotating: {}",
                        err
                    );
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::NoKeys(self.label.clone())))
    }
}
