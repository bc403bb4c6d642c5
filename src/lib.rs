//! eth-log-ingest - Ethereum contract log ingestion into a key-value store
//!
//! A Rust library and CLI that races a set of RPC endpoints for the lowest
//! latency, queries one contract/topic over a recent block window, resolves
//! each log's block concurrently with rate-limit backoff, and persists the
//! resulting records to Redis in batched pipelines under sequential keys.
//!
//! # Example
//!
//! ```rust,no_run
//! use eth_log_ingest::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder()
//!         .endpoint("https://ethereum-sepolia-rpc.publicnode.com")
//!         .endpoint("https://rpc.sepolia.org")
//!         .contract("0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48")
//!         .topic("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef")
//!         .window(1000)
//!         .batch_size(100)
//!         .build()?;
//!
//!     let summary = Pipeline::new(config).run().await?;
//!
//!     println!("Stored {} logs", summary.ingest.report.persisted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod model;
pub mod query;
pub mod resolver;
pub mod rpc;
pub mod store;
pub mod writer;

#[cfg(test)]
mod test_utils;

// Re-exports for convenience
pub use config::{
    Config, ConfigBuilder, ConfigFile, EndpointConfig, IngestSettings, ProbeSettings, RedisConfig,
    StoreConfig,
};
pub use error::{ConfigError, Error, ExportError, Result, RpcError, StoreError};
pub use export::{ExportSummary, Exporter};
pub use ingest::{select_endpoint, IngestSummary, Ingestor, Pipeline, RunSummary};
pub use model::{IngestRecord, LogFilter, RawLogEntry, ResolvedBlock};
pub use query::{LogQuery, QueryOutcome};
pub use resolver::BlockResolver;
pub use rpc::{select_fastest, AlloyChainClient, ChainClient, LatencyProber, Selection};
pub use store::{create_store, KvStore, MemoryStore, RedisStore, WriteOp};
pub use writer::{BatchWriter, IngestProgress, IngestReport, ProgressCallback};
