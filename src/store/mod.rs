//! Key-value store abstraction
//!
//! Ingestion only ever sets string keys to string values, in pipelines, and the
//! export step lists and reads them back. Both backends apply a pipeline as one
//! unit: Redis wraps it in `MULTI`/`EXEC`, the in-memory store holds its lock
//! for the whole batch. Other backends may only promise best-effort grouping.

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::config::StoreConfig;
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;

/// A pending `SET key value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub key: String,
    pub value: String,
}

impl WriteOp {
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Check the store is reachable without writing anything
    async fn ping(&self) -> Result<(), StoreError>;

    /// Write one key outside any pipeline.
    ///
    /// Ingestion always goes through [`KvStore::pipeline_execute`]; this is the
    /// unbatched form for seeding or repairing single keys.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Apply all operations as one unit
    async fn pipeline_execute(&self, ops: Vec<WriteOp>) -> Result<(), StoreError>;

    /// Keys matching a Redis glob pattern (`*`, `?`, `[...]`, `\\` escapes)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    async fn get(&self, key: &str) -> Result<String, StoreError>;
}

/// Creates a store instance based on the provided configuration
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>, StoreError> {
    match config {
        StoreConfig::Redis(redis) => Ok(Arc::new(RedisStore::connect(redis).await?)),
        StoreConfig::InMemory => Ok(Arc::new(MemoryStore::new())),
    }
}
