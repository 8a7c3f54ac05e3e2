use super::channel_models::ChannelConfig;
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Mirror error: {0}")]
    Mirror(String),
}

#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get(&self, channel_id: u64) -> Result<Option<ChannelConfig>, StoreError>;
    async fn save(&self, config: ChannelConfig) -> Result<(), StoreError>;
    async fn delete(&self, channel_id: u64) -> Result<(), StoreError>;
    async fn all(&self) -> Result<Vec<ChannelConfig>, StoreError>;
}

/// Remote copy of the channel file, for hosts whose local disk does not
/// survive a redeploy.
#[async_trait]
pub trait ChannelMirror: Send + Sync {
    /// Returns the mirrored JSON, or `None` if nothing has been mirrored yet.
    async fn fetch(&self) -> Result<Option<String>, StoreError>;
    async fn push(&self, json: &str) -> Result<(), StoreError>;
}
