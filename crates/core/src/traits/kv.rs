//! Distributed key-value store contract (the optional L2 cache tier)

use async_trait::async_trait;

use crate::error::Result;

/// Narrow KV interface; every operation may fail without affecting
/// correctness; the cache layer logs and degrades to L1-only.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn setex(&self, key: &str, ttl_seconds: u64, value: &str) -> Result<()>;

    async fn del(&self, key: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

/// Stand-in used when no distributed tier is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeyValueStore;

#[async_trait]
impl KeyValueStore for NoopKeyValueStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn setex(&self, _key: &str, _ttl_seconds: u64, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn del(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
