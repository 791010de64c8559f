use std::sync::Arc;
use tracing::{debug, info};

use taskqueue_core::config::{StoreConfig, StoreType};
use taskqueue_core::{QueueError, QueueStore, Result};

use crate::{InMemoryQueueStore, RedisQueueStore};

/// 根据配置创建共享存储
pub struct QueueStoreFactory;

impl QueueStoreFactory {
    pub async fn create(config: &StoreConfig) -> Result<Arc<dyn QueueStore>> {
        debug!("Creating queue store with type: {:?}", config.r#type);
        Self::validate_config(config)?;

        match config.r#type {
            StoreType::Redis => {
                info!("Initializing Redis queue store");
                let store = RedisQueueStore::new(config.redis.clone()).await?;
                store.ping().await?;
                Ok(Arc::new(store))
            }
            StoreType::InMemory => {
                info!("Initializing in-memory queue store");
                Ok(Arc::new(InMemoryQueueStore::new()))
            }
        }
    }

    pub fn validate_config(config: &StoreConfig) -> Result<()> {
        config
            .validate()
            .map_err(|e| QueueError::Configuration(format!("存储配置无效: {e}")))
    }
}
