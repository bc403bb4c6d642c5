//! Error types for eth-log-ingest

use alloy::primitives::B256;
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// RPC-related errors
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),

    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Export errors
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Errors produced by the chain client.
///
/// Rate limiting is its own variant so the block resolver can decide whether to
/// back off without inspecting message text.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("No candidate endpoints configured")]
    NoEndpoints,

    #[error("Rate limited by endpoint: {0}")]
    RateLimited(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to fetch latest block header: {0}")]
    HeaderFetch(String),

    #[error("Log query failed: {0}")]
    QueryFailed(String),

    #[error("Block {0:#x} not found")]
    BlockNotFound(B256),

    #[error("Invalid response from endpoint: {0}")]
    InvalidResponse(String),

    #[error("Failed to retrieve block after {retries} retries: {last}")]
    RetriesExhausted { retries: u32, last: Box<RpcError> },

    #[error("Provider error: {0}")]
    Provider(String),
}

impl RpcError {
    /// Whether this error is an upstream throttling signal worth backing off on
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RpcError::RateLimited(_))
    }
}

/// Key-value store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to connect to store: {0}")]
    Connection(String),

    #[error("Failed to write key {key}: {reason}")]
    Write { key: String, reason: String },

    #[error("Failed to execute pipeline of {ops} operations: {reason}")]
    Pipeline { ops: usize, reason: String },

    #[error("Failed to list keys matching {pattern}: {reason}")]
    Keys { pattern: String, reason: String },

    #[error("Failed to read key {key}: {reason}")]
    Read { key: String, reason: String },

    #[error("Key not found: {0}")]
    NotFound(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid config file: {0}")]
    InvalidFile(String),

    #[error("Invalid address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid topic hash: {0}")]
    InvalidTopic(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Config file parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Export-related errors
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to create export file: {0}")]
    FileCreate(String),

    #[error("Failed to write export file: {0}")]
    Write(String),
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_classification() {
        assert!(RpcError::RateLimited("429".to_string()).is_rate_limited());
        assert!(!RpcError::Provider("429 Too Many Requests".to_string()).is_rate_limited());
        assert!(!RpcError::BlockNotFound(B256::ZERO).is_rate_limited());
    }

    #[test]
    fn test_retries_exhausted_message() {
        let err = RpcError::RetriesExhausted {
            retries: 5,
            last: Box::new(RpcError::RateLimited("slow down".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Failed to retrieve block after 5 retries: Rate limited by endpoint: slow down"
        );
    }
}
