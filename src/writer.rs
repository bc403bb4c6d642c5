//! Batched ingestion writer
//!
//! Each log becomes one unit of work: resolve its block, build the record,
//! serialize it. Units run concurrently up to a configured limit and complete
//! in any order. Their results come back to one consumer, the only owner of the
//! pending batch, which hands the batch to a flush task whenever it reaches its
//! size threshold and once more after the last unit finishes. Flushes run
//! alongside further block resolution; the writer waits for all of them before
//! returning.
//!
//! Keys are the log's position in the input, assigned before its unit starts,
//! so the key for a given log does not depend on completion order.

use crate::error::{Result, StoreError};
use crate::model::{IngestRecord, RawLogEntry};
use crate::resolver::BlockResolver;
use crate::store::{KvStore, WriteOp};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};

/// Progress callback type
pub type ProgressCallback = Box<dyn Fn(IngestProgress) + Send + Sync>;

/// Ingestion progress information
#[derive(Debug, Clone)]
pub struct IngestProgress {
    /// Units finished so far
    pub completed: usize,
    /// Units dispatched in total
    pub total: usize,
    /// Records flushed to the store
    pub persisted: usize,
    /// Logs dropped so far
    pub dropped: usize,
    /// Percentage complete
    pub percent: f64,
}

/// Outcome of writing a set of logs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Logs handed to the writer
    pub dispatched: usize,
    /// Records written by successful flushes
    pub persisted: usize,
    /// Pipelines executed, successful or not
    pub flushes: usize,
    pub failed_flushes: usize,
    /// Keys that were never written, ascending
    pub dropped_keys: Vec<u64>,
}

impl IngestReport {
    pub fn dropped(&self) -> usize {
        self.dropped_keys.len()
    }
}

/// Pending pipeline plus the sequence numbers it covers
#[derive(Default)]
struct Batch {
    ops: Vec<WriteOp>,
    keys: Vec<u64>,
}

impl Batch {
    fn push(&mut self, key: u64, value: String) {
        self.ops.push(WriteOp::set(key.to_string(), value));
        self.keys.push(key);
    }

    fn len(&self) -> usize {
        self.ops.len()
    }

    fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Keys of a spawned pipeline and how it ended
type FlushOutcome = (Vec<u64>, std::result::Result<(), StoreError>);

/// Resolves, serializes and persists logs in batches
pub struct BatchWriter {
    resolver: BlockResolver,
    store: Arc<dyn KvStore>,
    batch_size: usize,
    concurrency: usize,
    progress_callback: Option<ProgressCallback>,
}

impl BatchWriter {
    pub fn new(
        resolver: BlockResolver,
        store: Arc<dyn KvStore>,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            store,
            batch_size: batch_size.max(1),
            concurrency: concurrency.max(1),
            progress_callback: None,
        }
    }

    /// Set progress callback
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(IngestProgress) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub(crate) fn set_progress(&mut self, callback: Option<ProgressCallback>) {
        self.progress_callback = callback;
    }

    /// Write every entry under its input position as key.
    ///
    /// Per-log failures are logged and recorded in the report; they never fail
    /// the call. Returns only after every unit has finished and the final
    /// batch has been flushed.
    pub async fn write_all(&self, entries: Vec<RawLogEntry>) -> IngestReport {
        let total = entries.len();
        let mut report = IngestReport {
            dispatched: total,
            ..Default::default()
        };
        let mut batch = Batch::default();
        let mut flushes = JoinSet::new();
        let mut completed = 0;

        let resolver = &self.resolver;
        let mut units = stream::iter(entries.into_iter().enumerate())
            .map(|(seq, entry)| async move {
                let key = seq as u64;
                (key, Self::build_value(resolver, &entry).await)
            })
            .buffer_unordered(self.concurrency);

        while let Some((key, outcome)) = units.next().await {
            completed += 1;
            match outcome {
                Ok(value) => batch.push(key, value),
                Err(e) => {
                    tracing::warn!("Dropping log {}: {}", key, e);
                    report.dropped_keys.push(key);
                }
            }

            if batch.len() >= self.batch_size {
                self.spawn_flush(&mut batch, &mut flushes, &mut report);
            }

            while let Some(joined) = flushes.try_join_next() {
                Self::settle(joined, &mut report);
            }
            self.report_progress(completed, total, &report);
        }

        // Every unit has finished; flush whatever is left
        if !batch.is_empty() {
            self.spawn_flush(&mut batch, &mut flushes, &mut report);
        }
        while let Some(joined) = flushes.join_next().await {
            Self::settle(joined, &mut report);
        }

        report.dropped_keys.sort_unstable();
        tracing::info!(
            "Stored {} of {} logs in {} flushes ({} dropped)",
            report.persisted,
            report.dispatched,
            report.flushes,
            report.dropped()
        );
        report
    }

    async fn build_value(resolver: &BlockResolver, entry: &RawLogEntry) -> Result<String> {
        let block = resolver.resolve(entry.block_hash).await?;
        let record = IngestRecord::new(entry, &block)?;
        tracing::debug!(
            "Resolved log {} in block {:#x}",
            record.log_index,
            entry.block_hash
        );
        record.to_json()
    }

    /// Hand the pending batch to its own task so resolution keeps going
    fn spawn_flush(
        &self,
        batch: &mut Batch,
        flushes: &mut JoinSet<FlushOutcome>,
        report: &mut IngestReport,
    ) {
        let Batch { ops, keys } = std::mem::take(batch);
        let store = self.store.clone();
        report.flushes += 1;

        flushes.spawn(async move {
            let count = ops.len();
            let result = AssertUnwindSafe(store.pipeline_execute(ops))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(StoreError::Pipeline {
                        ops: count,
                        reason: "pipeline task panicked".to_string(),
                    })
                });
            (keys, result)
        });
    }

    fn settle(joined: std::result::Result<FlushOutcome, JoinError>, report: &mut IngestReport) {
        match joined {
            Ok((keys, Ok(()))) => {
                report.persisted += keys.len();
                tracing::debug!("Flushed batch of {} records", keys.len());
            }
            Ok((keys, Err(e))) => {
                report.failed_flushes += 1;
                report.dropped_keys.extend(keys);
                tracing::error!("Failed to execute pipeline: {}", e);
            }
            Err(e) => {
                // Flush tasks are never aborted and catch their own panics
                report.failed_flushes += 1;
                tracing::error!("Flush task did not complete: {}", e);
            }
        }
    }

    fn report_progress(&self, completed: usize, total: usize, report: &IngestReport) {
        if let Some(cb) = &self.progress_callback {
            cb(IngestProgress {
                completed,
                total,
                persisted: report.persisted,
                dropped: report.dropped(),
                percent: if total > 0 {
                    (completed as f64 / total as f64) * 100.0
                } else {
                    100.0
                },
            });
        }
    }
}
