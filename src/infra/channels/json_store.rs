use crate::core::channels::{ChannelConfig, ChannelMirror, ChannelStore, StoreError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Channel configs kept in one pretty-printed JSON file, keyed by channel id.
pub struct JsonChannelStore {
    path: PathBuf,
    cache: RwLock<BTreeMap<u64, ChannelConfig>>,
    mirror: Option<Arc<dyn ChannelMirror>>,
    /// Held from mutation until the file and mirror are written, so snapshots
    /// land in the order they were taken.
    write_lock: Mutex<()>,
}

impl JsonChannelStore {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let cache = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        tracing::info!(path = %path.display(), channels = cache.len(), "Loaded channel configs");
        Ok(Self {
            path,
            cache: RwLock::new(cache),
            mirror: None,
            write_lock: Mutex::new(()),
        })
    }

    pub fn with_mirror(mut self, mirror: Arc<dyn ChannelMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// Fills an empty local store from the mirror. Returns how many channels
    /// were restored; a non-empty local store is left untouched.
    pub async fn restore_from_mirror(&self) -> Result<usize, StoreError> {
        let Some(mirror) = &self.mirror else {
            return Ok(0);
        };
        let _writing = self.write_lock.lock().await;
        if !self.cache.read().await.is_empty() {
            return Ok(0);
        }

        let Some(raw) = mirror.fetch().await? else {
            tracing::info!("Channel mirror is empty, nothing to restore");
            return Ok(0);
        };
        let restored: BTreeMap<u64, ChannelConfig> = serde_json::from_str(&raw)?;
        let count = restored.len();

        let json = serde_json::to_string_pretty(&restored)?;
        *self.cache.write().await = restored;
        self.write_file(&json).await?;

        tracing::info!(channels = count, "Restored channel configs from mirror");
        Ok(count)
    }

    async fn write_file(&self, json: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Callers hold `write_lock`.
    async fn persist(&self) -> Result<(), StoreError> {
        let json = {
            let cache = self.cache.read().await;
            serde_json::to_string_pretty(&*cache)?
        };
        self.write_file(&json).await?;

        // The local file is authoritative; a failed push is retried on the next write.
        if let Some(mirror) = &self.mirror {
            if let Err(e) = mirror.push(&json).await {
                tracing::warn!("Failed to push channel configs to mirror: {}", e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelStore for JsonChannelStore {
    async fn get(&self, channel_id: u64) -> Result<Option<ChannelConfig>, StoreError> {
        Ok(self.cache.read().await.get(&channel_id).cloned())
    }

    async fn save(&self, config: ChannelConfig) -> Result<(), StoreError> {
        let _writing = self.write_lock.lock().await;
        let mut cache = self.cache.write().await;
        cache.insert(config.channel_id, config);
        drop(cache); // Readers may proceed while the file is written
        self.persist().await
    }

    async fn delete(&self, channel_id: u64) -> Result<(), StoreError> {
        let _writing = self.write_lock.lock().await;
        let mut cache = self.cache.write().await;
        let existed = cache.remove(&channel_id).is_some();
        drop(cache);
        if existed {
            self.persist().await?;
        }
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ChannelConfig>, StoreError> {
        Ok(self.cache.read().await.values().cloned().collect())
    }
}
