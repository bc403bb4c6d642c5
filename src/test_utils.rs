//! Mocks shared by unit tests

use crate::error::{RpcError, StoreError};
use crate::model::{LogFilter, RawLogEntry, ResolvedBlock};
use crate::rpc::ChainClient;
use crate::store::{KvStore, MemoryStore, WriteOp};
use alloy::primitives::B256;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Timestamp the mock reports for a block hash
pub(crate) fn block_time_for(hash: B256) -> u64 {
    1_700_000_000 + u64::from(hash[31])
}

/// The block the mock returns when no failure is scripted
pub(crate) fn block_for(hash: B256) -> ResolvedBlock {
    ResolvedBlock {
        hash,
        timestamp: block_time_for(hash),
        parent_hash: B256::repeat_byte(hash[31].wrapping_add(1)),
    }
}

/// A log in a block whose hash ends in `n`
pub(crate) fn log_in_block(n: u8, log_index: u64) -> RawLogEntry {
    let mut hash = B256::repeat_byte(0xb0);
    hash.0[31] = n;
    RawLogEntry::new(format!("root-{}", n).into_bytes(), hash, log_index)
}

/// Scriptable [`ChainClient`]
#[derive(Default)]
pub(crate) struct MockChainClient {
    head: u64,
    logs: Vec<RawLogEntry>,
    unfiltered: Vec<RawLogEntry>,
    fail_query: bool,
    fail_header: bool,
    scripts: Mutex<HashMap<B256, VecDeque<Result<ResolvedBlock, RpcError>>>>,
    block_calls: AtomicUsize,
    filters: Mutex<Vec<LogFilter>>,
}

impl MockChainClient {
    pub(crate) fn new(head: u64) -> Self {
        Self {
            head,
            ..Default::default()
        }
    }

    pub(crate) fn with_logs(mut self, logs: Vec<RawLogEntry>) -> Self {
        self.logs = logs;
        self
    }

    /// Logs returned when the topic filter is removed
    pub(crate) fn with_unfiltered_logs(mut self, logs: Vec<RawLogEntry>) -> Self {
        self.unfiltered = logs;
        self
    }

    pub(crate) fn failing_query(mut self) -> Self {
        self.fail_query = true;
        self
    }

    pub(crate) fn failing_header(mut self) -> Self {
        self.fail_header = true;
        self
    }

    /// Queue responses for a block hash; once drained, the block resolves
    pub(crate) fn script_block(
        self,
        hash: B256,
        responses: Vec<Result<ResolvedBlock, RpcError>>,
    ) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.entry(hash).or_default().extend(responses);
        }
        self
    }

    pub(crate) fn block_calls(&self) -> usize {
        self.block_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn filters(&self) -> Vec<LogFilter> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(11_155_111)
    }

    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        if self.fail_header {
            return Err(RpcError::Provider("connection reset".to_string()));
        }
        Ok(self.head)
    }

    async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<RawLogEntry>, RpcError> {
        self.filters.lock().unwrap().push(*filter);
        if self.fail_query {
            return Err(RpcError::Provider("query timed out".to_string()));
        }
        Ok(match filter.topic {
            Some(_) => self.logs.clone(),
            None => self.unfiltered.clone(),
        })
    }

    async fn block_by_hash(&self, hash: B256) -> Result<ResolvedBlock, RpcError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&hash)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or_else(|| Ok(block_for(hash)))
    }
}

/// Memory store whose pipelines fail when they contain a poisoned key
pub(crate) struct FlakyStore {
    pub(crate) inner: Arc<MemoryStore>,
    poisoned: HashSet<String>,
}

impl FlakyStore {
    pub(crate) fn new(poisoned: &[&str]) -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            poisoned: poisoned.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[async_trait]
impl KvStore for FlakyStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn pipeline_execute(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        if ops.iter().any(|op| self.poisoned.contains(&op.key)) {
            return Err(StoreError::Pipeline {
                ops: ops.len(),
                reason: "EXECABORT".to_string(),
            });
        }
        self.inner.pipeline_execute(ops).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(pattern).await
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        if self.poisoned.contains(key) {
            return Err(StoreError::Read {
                key: key.to_string(),
                reason: "WRONGTYPE".to_string(),
            });
        }
        self.inner.get(key).await
    }
}

/// Memory store whose pipelines take `delay` to complete
pub(crate) struct SlowStore {
    pub(crate) inner: Arc<MemoryStore>,
    delay: std::time::Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SlowStore {
    pub(crate) fn new(delay: std::time::Duration) -> Self {
        Self {
            inner: Arc::new(MemoryStore::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Most pipelines that were running at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for SlowStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value).await
    }

    async fn pipeline_execute(&self, ops: Vec<WriteOp>) -> Result<(), StoreError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.pipeline_execute(ops).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.inner.keys(pattern).await
    }

    async fn get(&self, key: &str) -> Result<String, StoreError> {
        self.inner.get(key).await
    }
}
