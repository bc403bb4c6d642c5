//! Configuration file handling

use super::EndpointConfig;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file structure
///
/// Every value is optional; anything left out falls back to flags, the
/// environment or built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Contract to watch
    #[serde(default)]
    pub contract: Option<String>,

    /// Event topic to filter on
    #[serde(default)]
    pub topic: Option<String>,

    /// Export file path
    #[serde(default)]
    pub export_path: Option<PathBuf>,

    /// Ingestion settings
    #[serde(default)]
    pub settings: Settings,

    /// Candidate RPC endpoints
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Redis connection
    #[serde(default)]
    pub redis: Option<RedisFileConfig>,
}

/// Ingestion settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Blocks before head to scan
    #[serde(default)]
    pub window: Option<u64>,

    /// Records per store pipeline
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Block fetch attempts per log
    #[serde(default)]
    pub max_retries: Option<u32>,

    /// Block resolutions in flight
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Probe timeout in milliseconds
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    /// Re-query without topic on empty results
    #[serde(default)]
    pub topic_fallback: Option<bool>,
}

/// Redis section of the config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisFileConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: Option<i64>,
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eth-log-ingest")
            .join("config.toml")
    }

    /// Load from default path
    pub fn load_default() -> Result<Option<Self>> {
        let path = Self::default_path();
        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Load from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::InvalidFile(format!("{}: {}", path.display(), e)))?;

        let config: Self = toml::from_str(&content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Save to a specific path
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::InvalidFile(format!("Failed to create directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::InvalidFile(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// URLs of endpoints that are not disabled
    pub fn enabled_endpoint_urls(&self) -> Vec<String> {
        super::enabled_urls(&self.endpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
contract = "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"
topic = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"

[settings]
window = 100
batch_size = 50

[[endpoints]]
url = "https://sepolia.example/rpc"
note = "primary"

[[endpoints]]
url = "https://disabled.example/rpc"
enabled = false

[redis]
host = "redis.internal"
port = 6380
"#;

        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.settings.window, Some(100));
        assert_eq!(config.settings.batch_size, Some(50));
        assert_eq!(config.settings.max_retries, None);
        assert_eq!(config.endpoints.len(), 2);
        assert_eq!(
            config.enabled_endpoint_urls(),
            vec!["https://sepolia.example/rpc".to_string()]
        );

        let redis = config.redis.unwrap();
        assert_eq!(redis.host.as_deref(), Some("redis.internal"));
        assert_eq!(redis.port, Some(6380));
        assert_eq!(redis.password, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = ConfigFile {
            settings: Settings {
                concurrency: Some(8),
                ..Default::default()
            },
            endpoints: vec![EndpointConfig::new("https://rpc.example")],
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = ConfigFile::load(&path).unwrap();
        assert_eq!(loaded.settings.concurrency, Some(8));
        assert_eq!(loaded.endpoints, config.endpoints);
    }

    #[test]
    fn test_default_path() {
        let path = ConfigFile::default_path();
        assert!(path.to_string_lossy().contains("eth-log-ingest"));
    }
}
