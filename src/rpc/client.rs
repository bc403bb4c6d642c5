//! Chain client abstraction and its alloy-backed implementation

use crate::error::RpcError;
use crate::model::{LogFilter, RawLogEntry, ResolvedBlock};
use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError as TransportRpcError, TransportError, TransportErrorKind};
use async_trait::async_trait;

/// JSON-RPC error codes providers use to signal throttling
const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

/// The subset of chain access ingestion needs.
///
/// Implementations classify throttling as [`RpcError::RateLimited`]; callers
/// never look at error text.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Chain id of the connected network
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Number of the current chain head
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// Execute one filtered log query
    async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<RawLogEntry>, RpcError>;

    /// Fetch the timestamp and parent of a block
    async fn block_by_hash(&self, hash: B256) -> Result<ResolvedBlock, RpcError>;
}

/// [`ChainClient`] over an HTTP alloy provider
#[derive(Clone)]
pub struct AlloyChainClient {
    provider: DynProvider,
    url: String,
}

impl AlloyChainClient {
    /// Connect to an endpoint and check it answers with a chain id
    pub async fn dial(url: &str) -> Result<Self, RpcError> {
        let parsed: Url = url
            .parse()
            .map_err(|e| RpcError::ConnectionFailed(format!("invalid RPC URL {}: {}", url, e)))?;

        let client = Self {
            provider: ProviderBuilder::new().connect_http(parsed).erased(),
            url: url.to_string(),
        };

        let chain_id = client
            .chain_id()
            .await
            .map_err(|e| RpcError::ConnectionFailed(format!("{}: {}", url, e)))?;
        tracing::info!("Connected to {} (chain id {})", url, chain_id);

        Ok(client)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.provider.get_chain_id().await.map_err(classify)
    }

    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        self.provider.get_block_number().await.map_err(classify)
    }

    async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<RawLogEntry>, RpcError> {
        let logs = self
            .provider
            .get_logs(&Filter::from(filter))
            .await
            .map_err(classify)?;

        let mut entries = Vec::with_capacity(logs.len());
        for log in logs {
            match RawLogEntry::try_from(log) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!("Skipping log: {}", e),
            }
        }
        Ok(entries)
    }

    async fn block_by_hash(&self, hash: B256) -> Result<ResolvedBlock, RpcError> {
        let block = self
            .provider
            .get_block_by_hash(hash)
            .await
            .map_err(classify)?
            .ok_or(RpcError::BlockNotFound(hash))?;

        Ok(ResolvedBlock {
            hash,
            timestamp: block.header.timestamp,
            parent_hash: block.header.parent_hash,
        })
    }
}

/// Map a transport error onto the ingestion error taxonomy
pub(crate) fn classify(err: TransportError) -> RpcError {
    let rate_limited = match &err {
        TransportRpcError::Transport(TransportErrorKind::HttpError(http)) => http.status == 429,
        TransportRpcError::ErrorResp(payload) => RATE_LIMIT_CODES.contains(&payload.code),
        _ => false,
    };

    if rate_limited {
        RpcError::RateLimited(err.to_string())
    } else {
        RpcError::Provider(err.to_string())
    }
}
