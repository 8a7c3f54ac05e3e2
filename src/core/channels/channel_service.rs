// Channel activation service.
//
// Decides in which channels Setsuna listens and which provider/model each
// channel prefers. NO Discord dependencies here - ids are plain u64s.

use super::channel_models::ChannelConfig;
use super::channel_store::{ChannelStore, StoreError};
use crate::core::ai::ProviderKind;
use chrono::Utc;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0} is not available: no API key configured")]
    ProviderUnavailable(ProviderKind),
    #[error("Setsuna is not active in this channel")]
    NotActive,
}

pub struct ChannelService<S: ChannelStore> {
    store: S,
}

impl<S: ChannelStore> ChannelService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Activates (or re-configures) a channel.
    ///
    /// `available` lists the providers that have keys; activating with any
    /// other provider is refused so a channel never ends up silent.
    pub async fn activate(
        &self,
        channel_id: u64,
        guild_id: Option<u64>,
        provider: ProviderKind,
        model: Option<String>,
        user_id: u64,
        available: &[ProviderKind],
    ) -> Result<ChannelConfig, ChannelError> {
        if !available.contains(&provider) {
            return Err(ChannelError::ProviderUnavailable(provider));
        }

        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        let config = ChannelConfig {
            channel_id,
            guild_id,
            active: true,
            provider,
            model,
            updated_by: Some(user_id),
            updated_at: Utc::now(),
        };

        self.store.save(config.clone()).await?;
        tracing::info!(
            channel_id,
            provider = %provider,
            model = ?config.model,
            "Channel activated"
        );
        Ok(config)
    }

    /// Deactivates a channel, keeping its provider choice for next time.
    pub async fn deactivate(&self, channel_id: u64, user_id: u64) -> Result<(), ChannelError> {
        let mut config = match self.store.get(channel_id).await? {
            Some(config) if config.active => config,
            _ => return Err(ChannelError::NotActive),
        };

        config.active = false;
        config.updated_by = Some(user_id);
        config.updated_at = Utc::now();
        self.store.save(config).await?;
        tracing::info!(channel_id, "Channel deactivated");
        Ok(())
    }

    pub async fn get(&self, channel_id: u64) -> Result<Option<ChannelConfig>, ChannelError> {
        Ok(self.store.get(channel_id).await?)
    }

    /// The channel's config if Setsuna is currently active there.
    pub async fn active_config(
        &self,
        channel_id: u64,
    ) -> Result<Option<ChannelConfig>, ChannelError> {
        Ok(self.store.get(channel_id).await?.filter(|c| c.active))
    }

    /// Active channels, optionally restricted to one guild, ordered by id.
    pub async fn list_active(
        &self,
        guild_id: Option<u64>,
    ) -> Result<Vec<ChannelConfig>, ChannelError> {
        let mut configs: Vec<ChannelConfig> = self
            .store
            .all()
            .await?
            .into_iter()
            .filter(|c| c.active)
            .filter(|c| guild_id.is_none() || c.guild_id == guild_id)
            .collect();
        configs.sort_by_key(|c| c.channel_id);
        Ok(configs)
    }

    /// Drops a channel's record entirely (e.g. the channel was deleted).
    pub async fn forget(&self, channel_id: u64) -> Result<(), ChannelError> {
        self.store.delete(channel_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct MemoryStore {
        configs: RwLock<HashMap<u64, ChannelConfig>>,
    }

    #[async_trait]
    impl ChannelStore for MemoryStore {
        async fn get(&self, channel_id: u64) -> Result<Option<ChannelConfig>, StoreError> {
            Ok(self.configs.read().await.get(&channel_id).cloned())
        }

        async fn save(&self, config: ChannelConfig) -> Result<(), StoreError> {
            self.configs.write().await.insert(config.channel_id, config);
            Ok(())
        }

        async fn delete(&self, channel_id: u64) -> Result<(), StoreError> {
            self.configs.write().await.remove(&channel_id);
            Ok(())
        }

        async fn all(&self) -> Result<Vec<ChannelConfig>, StoreError> {
            Ok(self.configs.read().await.values().cloned().collect())
        }
    }

    const AVAILABLE: &[ProviderKind] = &[ProviderKind::Gemini, ProviderKind::Groq];

    #[tokio::test]
    async fn test_activate_and_lookup() {
        let service = ChannelService::new(MemoryStore::default());
        let config = service
            .activate(10, Some(1), ProviderKind::Groq, Some("  llama-3.1-8b-instant ".into()), 7, AVAILABLE)
            .await
            .unwrap();

        assert!(config.active);
        assert_eq!(config.model.as_deref(), Some("llama-3.1-8b-instant"));
        assert!(service.active_config(10).await.unwrap().is_some());
        assert!(service.active_config(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_activate_refuses_provider_without_keys() {
        let service = ChannelService::new(MemoryStore::default());
        let err = service
            .activate(10, None, ProviderKind::DeepSeek, None, 7, AVAILABLE)
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::ProviderUnavailable(ProviderKind::DeepSeek)));
        assert!(service.get(10).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_blank_model_means_default() {
        let service = ChannelService::new(MemoryStore::default());
        let config = service
            .activate(10, None, ProviderKind::Gemini, Some("   ".into()), 7, AVAILABLE)
            .await
            .unwrap();
        assert!(config.model.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_keeps_record() {
        let service = ChannelService::new(MemoryStore::default());
        service
            .activate(10, None, ProviderKind::Groq, None, 7, AVAILABLE)
            .await
            .unwrap();

        service.deactivate(10, 8).await.unwrap();

        assert!(service.active_config(10).await.unwrap().is_none());
        let record = service.get(10).await.unwrap().unwrap();
        assert!(!record.active);
        assert_eq!(record.provider, ProviderKind::Groq);
        assert_eq!(record.updated_by, Some(8));
    }

    #[tokio::test]
    async fn test_deactivate_inactive_channel_fails() {
        let service = ChannelService::new(MemoryStore::default());
        assert!(matches!(
            service.deactivate(10, 7).await,
            Err(ChannelError::NotActive)
        ));

        service
            .activate(10, None, ProviderKind::Groq, None, 7, AVAILABLE)
            .await
            .unwrap();
        service.deactivate(10, 7).await.unwrap();
        assert!(matches!(
            service.deactivate(10, 7).await,
            Err(ChannelError::NotActive)
        ));
    }

    #[tokio::test]
    async fn test_list_active_filters_by_guild() {
        let service = ChannelService::new(MemoryStore::default());
        service.activate(3, Some(1), ProviderKind::Gemini, None, 7, AVAILABLE).await.unwrap();
        service.activate(2, Some(1), ProviderKind::Groq, None, 7, AVAILABLE).await.unwrap();
        service.activate(5, Some(2), ProviderKind::Gemini, None, 7, AVAILABLE).await.unwrap();
        service.activate(4, Some(1), ProviderKind::Gemini, None, 7, AVAILABLE).await.unwrap();
        service.deactivate(4, 7).await.unwrap();

        let ids: Vec<u64> = service
            .list_active(Some(1))
            .await
            .unwrap()
            .iter()
            .map(|c| c.channel_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(service.list_active(None).await.unwrap().len(), 3);
    }
}
