//! Log, block and persisted record types

use crate::error::{Error, Result, RpcError};
use alloy::primitives::{Address, Bytes, B256};
use alloy::rpc::types::{Filter, Log};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Address/topic filter over an inclusive block range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    /// `None` matches every event the contract emits
    pub topic: Option<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    /// Filter over `[head - window, head]`, clamped at genesis
    pub fn for_window(address: Address, topic: B256, head: u64, window: u64) -> Self {
        Self {
            address,
            topic: Some(topic),
            from_block: head.saturating_sub(window),
            to_block: head,
        }
    }

    /// Same range and address with topic filtering removed
    pub fn without_topic(&self) -> Self {
        Self {
            topic: None,
            ..*self
        }
    }

    /// Number of blocks covered
    pub fn block_count(&self) -> u64 {
        self.to_block.saturating_sub(self.from_block) + 1
    }
}

impl From<&LogFilter> for Filter {
    fn from(filter: &LogFilter) -> Self {
        let base = Filter::new()
            .address(filter.address)
            .from_block(filter.from_block)
            .to_block(filter.to_block);

        match filter.topic {
            Some(topic) => base.event_signature(topic),
            None => base,
        }
    }
}

/// A matching log as returned by the chain, reduced to what ingestion needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    /// Opaque event payload
    pub data: Bytes,
    /// Hash of the block the log was emitted in
    pub block_hash: B256,
    /// Position of the log within the block's event stream
    pub log_index: u64,
}

impl RawLogEntry {
    pub fn new(data: impl Into<Bytes>, block_hash: B256, log_index: u64) -> Self {
        Self {
            data: data.into(),
            block_hash,
            log_index,
        }
    }
}

impl TryFrom<Log> for RawLogEntry {
    type Error = RpcError;

    /// Pending logs carry no block hash or log index and cannot be resolved.
    fn try_from(log: Log) -> std::result::Result<Self, Self::Error> {
        let block_hash = log.block_hash.ok_or_else(|| {
            RpcError::InvalidResponse("log is missing its block hash".to_string())
        })?;

        Ok(Self {
            data: log.data().data.clone(),
            block_hash,
            log_index: log.log_index.ok_or_else(|| {
                RpcError::InvalidResponse("log is missing its log index".to_string())
            })?,
        })
    }
}

/// Block fields needed to build a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedBlock {
    pub hash: B256,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    pub parent_hash: B256,
}

/// The unit persisted per log.
///
/// Field names on the wire are fixed: `l1RootInfo`, `blocktime`, `parenthash`
/// and `logIndex`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Log payload bytes interpreted as a string
    #[serde(rename = "l1RootInfo")]
    pub payload: String,
    #[serde(rename = "blocktime")]
    pub block_time: DateTime<Utc>,
    #[serde(rename = "parenthash")]
    pub parent_hash: B256,
    #[serde(rename = "logIndex")]
    pub log_index: u64,
}

impl IngestRecord {
    /// Build a record from a log and its resolved block.
    ///
    /// Payload bytes that are not valid UTF-8 are replaced with U+FFFD.
    pub fn new(entry: &RawLogEntry, block: &ResolvedBlock) -> Result<Self> {
        let seconds = i64::try_from(block.timestamp).map_err(|_| {
            RpcError::InvalidResponse(format!("block timestamp {} out of range", block.timestamp))
        })?;
        let block_time = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            RpcError::InvalidResponse(format!("block timestamp {} out of range", block.timestamp))
        })?;

        Ok(Self {
            payload: String::from_utf8_lossy(&entry.data).into_owned(),
            block_time,
            parent_hash: block.parent_hash,
            log_index: entry.log_index,
        })
    }

    /// Serialize to the stored JSON form
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Error::from)
    }

    /// Parse a stored value
    pub fn from_json(value: &str) -> Result<Self> {
        serde_json::from_str(value).map_err(Error::from)
    }
}
