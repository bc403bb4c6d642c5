//! Run orchestration
//!
//! [`Ingestor`] covers one pass against an already connected chain and store:
//! read the head, query the window, write the logs. [`Pipeline`] wraps it with
//! everything a full run needs around that: probing and picking an endpoint,
//! connecting to the store, and the optional export at the end.

use crate::config::Config;
use crate::error::{Result, RpcError};
use crate::export::{ExportSummary, Exporter};
use crate::model::LogFilter;
use crate::query::LogQuery;
use crate::resolver::BlockResolver;
use crate::rpc::{select_fastest, AlloyChainClient, ChainClient, LatencyProber, Selection};
use crate::store::{create_store, KvStore};
use crate::writer::{BatchWriter, IngestProgress, IngestReport, ProgressCallback};
use std::sync::Arc;

/// Result of one ingestion pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    /// Chain head the window was anchored to
    pub head: u64,
    pub filter: LogFilter,
    /// Diagnostic count from the topic-less fallback query, if it ran
    pub unfiltered_count: Option<usize>,
    pub report: IngestReport,
}

/// Header fetch, window query and batched write against fixed collaborators
pub struct Ingestor {
    client: Arc<dyn ChainClient>,
    query: LogQuery,
    writer: BatchWriter,
}

impl Ingestor {
    pub fn new(client: Arc<dyn ChainClient>, store: Arc<dyn KvStore>, config: &Config) -> Self {
        let settings = &config.ingest;
        let resolver = BlockResolver::new(client.clone(), settings.max_retries, settings.backoff_unit);

        Self {
            query: LogQuery::new(config.contract, config.topic, settings),
            writer: BatchWriter::new(resolver, store, settings.batch_size, settings.concurrency),
            client,
        }
    }

    /// Set progress callback
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(IngestProgress) + Send + Sync + 'static,
    {
        self.writer.set_progress(Some(Box::new(callback)));
        self
    }

    fn set_progress(&mut self, callback: Option<ProgressCallback>) {
        self.writer.set_progress(callback);
    }

    /// Run one pass. Header and query failures abort; per-log failures are
    /// only counted in the report.
    pub async fn run(&self) -> Result<IngestSummary> {
        let head = self
            .client
            .latest_block_number()
            .await
            .map_err(|e| RpcError::HeaderFetch(e.to_string()))?;
        tracing::info!("Latest block: {}", head);

        let outcome = self.query.execute(self.client.as_ref(), head).await?;
        let report = self.writer.write_all(outcome.logs).await;

        Ok(IngestSummary {
            head,
            filter: outcome.filter,
            unfiltered_count: outcome.unfiltered_count,
            report,
        })
    }
}

/// Everything a completed run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Endpoint chosen by probing; `None` when a client was supplied
    pub endpoint: Option<Selection>,
    pub ingest: IngestSummary,
    /// `None` when export is disabled or failed
    pub export: Option<ExportSummary>,
}

/// A full ingestion run driven by a [`Config`]
pub struct Pipeline {
    config: Config,
    progress_callback: Option<ProgressCallback>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
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

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probe every candidate and pick the fastest
    pub async fn select_endpoint(&self) -> Result<Selection> {
        Ok(select_endpoint(&self.config).await?)
    }

    /// Probe, connect to chain and store, ingest, then export
    pub async fn run(self) -> Result<RunSummary> {
        let selection = self.select_endpoint().await?;
        let client = AlloyChainClient::dial(&selection.url).await?;

        let store = create_store(&self.config.store).await?;
        store.ping().await?;

        let mut summary = self.run_with(Arc::new(client), store).await?;
        summary.endpoint = Some(selection);
        Ok(summary)
    }

    /// Ingest and export with caller-supplied collaborators
    pub async fn run_with(
        self,
        client: Arc<dyn ChainClient>,
        store: Arc<dyn KvStore>,
    ) -> Result<RunSummary> {
        let Pipeline {
            config,
            progress_callback,
        } = self;

        let mut ingestor = Ingestor::new(client, store.clone(), &config);
        ingestor.set_progress(progress_callback);
        let ingest = ingestor.run().await?;

        // Records are already stored; a failed export does not fail the run
        let export = match &config.export_path {
            Some(path) => match Exporter::new(store).export_to_path(path).await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    tracing::error!("Export to {} failed: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        Ok(RunSummary {
            endpoint: None,
            ingest,
            export,
        })
    }
}

/// Probe the configured endpoints and return the fastest one
pub async fn select_endpoint(config: &Config) -> std::result::Result<Selection, RpcError> {
    if config.endpoints.is_empty() {
        return Err(RpcError::NoEndpoints);
    }

    let prober = LatencyProber::new(config.probe)?;
    let latencies = prober.measure(&config.endpoints).await;
    for (url, latency) in config.endpoints.iter().zip(&latencies) {
        tracing::debug!("{} -> {:?}", url, latency);
    }

    let selection = select_fastest(&config.endpoints, &latencies)?;
    if selection.latency >= prober.failure_latency() {
        tracing::warn!("No endpoint answered the probe; falling back to {}", selection.url);
    }
    tracing::info!(
        "Selected RPC endpoint: {} (latency {:?})",
        selection.url,
        selection.latency
    );
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use crate::test_utils::{log_in_block, MockChainClient};
    use tempfile::TempDir;

    fn config(export: Option<&std::path::Path>) -> Config {
        let builder = Config::builder()
            .endpoint("http://127.0.0.1:8545")
            .contract("0x00000000000000000000000000000000000000cc")
            .topic(format!("{:#x}", alloy::primitives::B256::repeat_byte(0xdd)))
            .window(100)
            .batch_size(2)
            .store(crate::config::StoreConfig::InMemory);

        let builder = match export {
            Some(path) => builder.export_path(path),
            None => builder.no_export(),
        };
        builder.build().unwrap()
    }

    fn client_with_logs(n: u8) -> Arc<MockChainClient> {
        Arc::new(MockChainClient::new(1000).with_logs((0..n).map(|i| log_in_block(i, 0)).collect()))
    }

    #[tokio::test]
    async fn test_ingestor_anchors_window_to_head() {
        let store = Arc::new(MemoryStore::new());
        let summary = Ingestor::new(client_with_logs(3), store.clone(), &config(None))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.head, 1000);
        assert_eq!((summary.filter.from_block, summary.filter.to_block), (900, 1000));
        assert_eq!(summary.report.persisted, 3);
        assert_eq!(store.pipeline_count(), 2);
    }

    #[tokio::test]
    async fn test_header_failure_aborts_before_query() {
        let client = Arc::new(MockChainClient::new(1000).failing_header());
        let store = Arc::new(MemoryStore::new());

        let err = Ingestor::new(client.clone(), store.clone(), &config(None))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Rpc(RpcError::HeaderFetch(_))));
        assert!(client.filters().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_query_failure_writes_nothing() {
        let client = Arc::new(MockChainClient::new(1000).failing_query());
        let store = Arc::new(MemoryStore::new());

        let err = Ingestor::new(client, store.clone(), &config(None))
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Rpc(RpcError::QueryFailed(_))));
        assert_eq!(store.pipeline_count(), 0);
    }

    #[tokio::test]
    async fn test_run_with_exports_after_ingest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redis.log");
        let store = Arc::new(MemoryStore::new());

        let summary = Pipeline::new(config(Some(&path)))
            .run_with(client_with_logs(3), store)
            .await
            .unwrap();

        assert_eq!(summary.endpoint, None);
        assert_eq!(summary.export.unwrap().exported, 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let keys: Vec<&str> = contents
            .lines()
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(keys, vec!["Key: 0", "Key: 1", "Key: 2"]);
    }

    #[tokio::test]
    async fn test_run_with_no_logs_still_exports() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("redis.log");
        let store = Arc::new(MemoryStore::new());

        let summary = Pipeline::new(config(Some(&path)))
            .run_with(client_with_logs(0), store.clone())
            .await
            .unwrap();

        assert_eq!(summary.ingest.report, IngestReport::default());
        assert_eq!(store.pipeline_count(), 0);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn test_export_failure_keeps_ingest_result() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("redis.log");
        let store = Arc::new(MemoryStore::new());

        let summary = Pipeline::new(config(Some(&path)))
            .run_with(client_with_logs(3), store.clone())
            .await
            .unwrap();

        assert_eq!(summary.export, None);
        assert_eq!(summary.ingest.report.persisted, 3);
        assert_eq!(store.len(), 3);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_progress_callback_is_forwarded() {
        let seen = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = seen.clone();

        Pipeline::new(config(None))
            .with_progress(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })
            .run_with(client_with_logs(2), Arc::new(MemoryStore::new()))
            .await
            .unwrap();

        assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
