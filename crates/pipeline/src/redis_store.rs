//! Redis implementation of the distributed KV tier

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::info;

use parts_search_core::{KeyValueStore, Result, SearchError};

/// Redis-backed `KeyValueStore`. Connection management and reconnects are
/// delegated to the driver's `ConnectionManager`.
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client =
            redis::Client::open(url).map_err(|e| SearchError::Cache(format!("redis url: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| SearchError::Cache(format!("redis connect: {e}")))?;
        info!("connected to redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key)
            .await
            .map_err(|e| SearchError::Cache(e.to_string()))
    }

    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_seconds)
            .await
            .map_err(|e| SearchError::Cache(e.to_string()))
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| SearchError::Cache(e.to_string()))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| SearchError::Cache(e.to_string()))
    }
}
