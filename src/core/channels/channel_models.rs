use crate::core::ai::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-channel activation record, persisted as one entry of the channel file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: u64,
    #[serde(default)]
    pub guild_id: Option<u64>,
    pub active: bool,
    pub provider: ProviderKind,
    /// Model override; `None` means the provider's configured default.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub updated_by: Option<u64>,
    pub updated_at: DateTime<Utc>,
}
