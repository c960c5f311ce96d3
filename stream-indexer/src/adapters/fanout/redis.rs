//! Redis PUBLISH real-time publisher

use crate::core::{IndexerError, IndexerResult, RealtimePublisher, StorageError};
use crate::domain::models::RealtimeEvent;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info};

pub struct RedisPublisher {
    manager: ConnectionManager,
    prefix: String,
}

impl RedisPublisher {
    /// Connect to Redis
    pub async fn connect(url: &str, prefix: impl Into<String>) -> IndexerResult<Self> {
        let client = Client::open(url)
            .map_err(|e| IndexerError::Storage(StorageError::Cache(e.to_string())))?;

        let manager = ConnectionManager::new(client).await?;

        info!("Redis publisher connected successfully");

        Ok(Self {
            manager,
            prefix: prefix.into(),
        })
    }
}

#[async_trait]
impl RealtimePublisher for RedisPublisher {
    async fn publish(&self, event: &RealtimeEvent) -> IndexerResult<()> {
        let mut conn = self.manager.clone();
        let channel = format!("{}{}", self.prefix, event.channel);
        let message = serde_json::to_string(event)?;

        let receivers: i64 = conn.publish(&channel, message).await?;

        debug!(channel = %channel, receivers, "published realtime event");
        Ok(())
    }
}
