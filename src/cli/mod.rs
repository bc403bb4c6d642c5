//! CLI argument definitions
//!
//! Run settings are global so they can be given before or after the
//! subcommand. Precedence is flag, then environment, then config file, then
//! built-in default.

pub mod config;
pub mod endpoints;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use eth_log_ingest::{Config, ConfigFile, RedisConfig, StoreConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "eth-log-ingest")]
#[command(
    version,
    about = "Ingest Ethereum contract logs into Redis using the fastest available RPC endpoint"
)]
#[command(after_help = r#"EXAMPLES:
    # Ingest the last 1000 blocks of Transfer events
    eth-log-ingest --rpc https://rpc.sepolia.org,https://ethereum-sepolia-rpc.publicnode.com \
                   -c 0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48 \
                   -t 0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef

    # Try a run without touching Redis
    eth-log-ingest --dry-run --export dry-run.log

    # Dump what is currently stored
    eth-log-ingest export -o redis.log

    # See which endpoint would be chosen
    eth-log-ingest endpoints probe

ENVIRONMENT VARIABLES:
    RPC_ENDPOINTS         Comma-separated candidate RPC URLs
    CONTRACT_ADDRESS      Contract to watch
    TOPIC                 Event topic hash
    REDIS_HOST, REDIS_PORT, REDIS_PASSWORD, REDIS_DB
    BLOCK_WINDOW, BATCH_SIZE, MAX_RETRIES, INGEST_CONCURRENCY

CONFIG FILE:
    Default: ~/.config/eth-log-ingest/config.toml
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query the block window and store matching logs (default)
    Ingest,

    /// Write every stored key/value pair to a file
    Export {
        /// Output file
        #[arg(short, long, default_value = eth_log_ingest::config::DEFAULT_EXPORT_PATH)]
        output: PathBuf,
    },

    /// Inspect candidate RPC endpoints
    Endpoints {
        #[command(subcommand)]
        action: endpoints::EndpointCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigCommands,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Candidate RPC endpoint (repeat or comma-separate)
    #[arg(
        long = "rpc",
        env = "RPC_ENDPOINTS",
        value_delimiter = ',',
        action = clap::ArgAction::Append,
        global = true
    )]
    pub rpc_urls: Vec<String>,

    /// Contract address to watch
    #[arg(short, long, env = "CONTRACT_ADDRESS", global = true)]
    pub contract: Option<String>,

    /// Event topic hash to filter on
    #[arg(short, long, env = "TOPIC", global = true)]
    pub topic: Option<String>,

    /// Blocks before the chain head to scan
    #[arg(short, long, env = "BLOCK_WINDOW", global = true)]
    pub window: Option<u64>,

    /// Records per Redis pipeline
    #[arg(short, long, env = "BATCH_SIZE", global = true)]
    pub batch_size: Option<usize>,

    /// Block fetch attempts per log
    #[arg(long, env = "MAX_RETRIES", global = true)]
    pub max_retries: Option<u32>,

    /// Block resolutions in flight at once
    #[arg(short = 'n', long, env = "INGEST_CONCURRENCY", global = true)]
    pub concurrency: Option<usize>,

    /// Skip the topic-less diagnostic query when nothing matches
    #[arg(long, global = true)]
    pub no_topic_fallback: bool,

    #[arg(long, env = "REDIS_HOST", global = true)]
    pub redis_host: Option<String>,

    #[arg(long, env = "REDIS_PORT", global = true)]
    pub redis_port: Option<u16>,

    #[arg(long, env = "REDIS_PASSWORD", hide_env_values = true, global = true)]
    pub redis_password: Option<String>,

    #[arg(long, env = "REDIS_DB", global = true)]
    pub redis_db: Option<i64>,

    /// Write to an in-memory store instead of Redis
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Export file written after ingestion
    #[arg(long = "export", id = "export_path", global = true)]
    pub export: Option<PathBuf>,

    /// Skip the export step
    #[arg(long, conflicts_with = "export_path", global = true)]
    pub no_export: bool,

    /// Config file to use instead of the default location
    #[arg(long = "config", global = true)]
    pub config_path: Option<PathBuf>,
}

impl RunArgs {
    /// Load the config file named by `--config`, or the default one if present
    pub fn load_file(&self) -> anyhow::Result<Option<ConfigFile>> {
        match &self.config_path {
            Some(path) => Ok(Some(ConfigFile::load(path)?)),
            None => Ok(ConfigFile::load_default()?),
        }
    }

    /// Candidate endpoints from flags/env, else from the config file
    pub fn endpoints(&self, file: Option<&ConfigFile>) -> Vec<String> {
        if !self.rpc_urls.is_empty() {
            return self.rpc_urls.clone();
        }
        file.map(ConfigFile::enabled_endpoint_urls)
            .unwrap_or_default()
    }

    pub fn store_config(&self, file: Option<&ConfigFile>) -> StoreConfig {
        if self.dry_run {
            return StoreConfig::InMemory;
        }

        let from_file = file.and_then(|f| f.redis.clone()).unwrap_or_default();
        let defaults = RedisConfig::default();

        StoreConfig::Redis(RedisConfig {
            host: self
                .redis_host
                .clone()
                .or(from_file.host)
                .unwrap_or(defaults.host),
            port: self.redis_port.or(from_file.port).unwrap_or(defaults.port),
            password: self
                .redis_password
                .clone()
                .or(from_file.password)
                .filter(|p| !p.is_empty()),
            db: self.redis_db.or(from_file.db).unwrap_or(defaults.db),
        })
    }

    /// Merge flags, environment and config file into a validated [`Config`]
    pub fn build_config(&self, file: Option<&ConfigFile>) -> anyhow::Result<Config> {
        let contract = self
            .contract
            .clone()
            .or_else(|| file.and_then(|f| f.contract.clone()))
            .context("Contract address is required. Use -c/--contract or CONTRACT_ADDRESS")?;
        let topic = self
            .topic
            .clone()
            .or_else(|| file.and_then(|f| f.topic.clone()))
            .context("Event topic is required. Use -t/--topic or TOPIC")?;

        let settings = file.map(|f| f.settings.clone()).unwrap_or_default();

        let mut builder = Config::builder()
            .endpoints(self.endpoints(file))
            .contract(contract)
            .topic(topic)
            .store(self.store_config(file))
            .topic_fallback(!self.no_topic_fallback && settings.topic_fallback.unwrap_or(true));

        if let Some(window) = self.window.or(settings.window) {
            builder = builder.window(window);
        }
        if let Some(size) = self.batch_size.or(settings.batch_size) {
            builder = builder.batch_size(size);
        }
        if let Some(retries) = self.max_retries.or(settings.max_retries) {
            builder = builder.max_retries(retries);
        }
        if let Some(concurrency) = self.concurrency.or(settings.concurrency) {
            builder = builder.concurrency(concurrency);
        }
        if let Some(ms) = settings.probe_timeout_ms {
            builder = builder.probe_timeout(Duration::from_millis(ms));
        }

        if self.no_export {
            builder = builder.no_export();
        } else if let Some(path) = self
            .export
            .clone()
            .or_else(|| file.and_then(|f| f.export_path.clone()))
        {
            builder = builder.export_path(path);
        }

        Ok(builder.build()?)
    }
}
