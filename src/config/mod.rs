//! Configuration for an ingestion run
//!
//! Values are layered by the binary (flags, environment, config file) and then
//! validated once by [`ConfigBuilder::build`]. Everything downstream treats a
//! [`Config`] as trusted.

mod endpoint;
mod file;

pub use endpoint::{enabled_urls, EndpointConfig};
pub use file::{ConfigFile, RedisFileConfig, Settings};

use crate::error::{ConfigError, Result};
use alloy::primitives::{Address, B256};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Blocks before the chain head included in the query
pub const DEFAULT_WINDOW: u64 = 1000;
/// Records per store pipeline
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Block fetch attempts before giving up on a log
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Linear backoff step between rate-limited block fetches
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
/// Block resolutions in flight at once
pub const DEFAULT_CONCURRENCY: usize = 32;
/// Per-endpoint reachability probe deadline
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// Latency assigned to endpoints whose probe failed
pub const DEFAULT_PROBE_FAILURE_LATENCY: Duration = Duration::from_secs(10);
/// Where the export step writes by default
pub const DEFAULT_EXPORT_PATH: &str = "redis.log";

pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Ingestion tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSettings {
    pub window: u64,
    pub batch_size: usize,
    pub max_retries: u32,
    pub backoff_unit: Duration,
    pub concurrency: usize,
    /// Re-query without the topic when the filtered query comes back empty
    pub topic_fallback: bool,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            concurrency: DEFAULT_CONCURRENCY,
            topic_fallback: true,
        }
    }
}

/// Latency probe settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    pub timeout: Duration,
    pub failure_latency: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            failure_latency: DEFAULT_PROBE_FAILURE_LATENCY,
        }
    }
}

/// Redis connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_REDIS_HOST.to_string(),
            port: DEFAULT_REDIS_PORT,
            password: None,
            db: 0,
        }
    }
}

impl RedisConfig {
    /// `host:port/db`, without credentials, for log lines
    pub fn display_addr(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Which store backend a run writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Redis(RedisConfig),
    InMemory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Redis(RedisConfig::default())
    }
}

/// Validated run configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Candidate RPC endpoints, in the order they are probed
    pub endpoints: Vec<String>,
    pub contract: Address,
    pub topic: B256,
    pub ingest: IngestSettings,
    pub probe: ProbeSettings,
    pub store: StoreConfig,
    /// `None` disables the export step
    pub export_path: Option<PathBuf>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`]
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    endpoints: Vec<String>,
    contract: Option<String>,
    topic: Option<String>,
    ingest: IngestSettings,
    probe: ProbeSettings,
    store: StoreConfig,
    export_path: Option<PathBuf>,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            contract: None,
            topic: None,
            ingest: IngestSettings::default(),
            probe: ProbeSettings::default(),
            store: StoreConfig::default(),
            export_path: Some(PathBuf::from(DEFAULT_EXPORT_PATH)),
        }
    }
}

impl ConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    pub fn endpoints<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn contract(mut self, address: impl Into<String>) -> Self {
        self.contract = Some(address.into());
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn window(mut self, blocks: u64) -> Self {
        self.ingest.window = blocks;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.ingest.batch_size = size;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.ingest.max_retries = retries;
        self
    }

    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.ingest.backoff_unit = unit;
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.ingest.concurrency = concurrency;
        self
    }

    pub fn topic_fallback(mut self, enabled: bool) -> Self {
        self.ingest.topic_fallback = enabled;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe.timeout = timeout;
        self
    }

    pub fn probe_failure_latency(mut self, latency: Duration) -> Self {
        self.probe.failure_latency = latency;
        self
    }

    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn export_path(mut self, path: impl AsRef<Path>) -> Self {
        self.export_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn no_export(mut self) -> Self {
        self.export_path = None;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<Config> {
        let endpoints = enabled_urls(
            &self
                .endpoints
                .into_iter()
                .map(EndpointConfig::new)
                .collect::<Vec<_>>(),
        );
        if endpoints.is_empty() {
            return Err(ConfigError::MissingField("endpoints".to_string()).into());
        }

        let contract = self
            .contract
            .ok_or_else(|| ConfigError::MissingField("contract".to_string()))?;
        let contract = Address::from_str(contract.trim())
            .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", contract, e)))?;

        let topic = self
            .topic
            .ok_or_else(|| ConfigError::MissingField("topic".to_string()))?;
        let topic = B256::from_str(topic.trim())
            .map_err(|e| ConfigError::InvalidTopic(format!("{}: {}", topic, e)))?;

        if self.ingest.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.ingest.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.ingest.max_retries == 0 {
            return Err(invalid("max_retries", "must be at least 1"));
        }

        Ok(Config {
            endpoints,
            contract,
            topic,
            ingest: self.ingest,
            probe: self.probe,
            store: self.store,
            export_path: self.export_path,
        })
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
