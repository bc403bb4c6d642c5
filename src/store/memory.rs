//! In-process store backend

use super::{KvStore, WriteOp};
use crate::error::StoreError;
use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

/// A [`KvStore`] kept in memory, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
    pipelines: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pipelines executed so far
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.read().map(|e| e.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .read()
            .map_err(|_| StoreError::Connection("in-memory store lock poisoned".to_string()))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>>, StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Connection("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.read().map(|_| ())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn pipeline_execute(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let mut entries = self.write()?;
        for op in ops {
            entries.insert(op.key, op.value);
        }
        self.pipelines.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let matcher = key_matcher(pattern)?;
        Ok(self
            .read()?
            .keys()
            .filter(|key| matcher.is_match(key.as_str()))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Compile a Redis `KEYS` pattern: `*`, `?`, `[...]` classes and `\` escapes
fn key_matcher(pattern: &str) -> Result<GlobMatcher, StoreError> {
    GlobBuilder::new(pattern)
        .backslash_escape(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| StoreError::Keys {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })
}
