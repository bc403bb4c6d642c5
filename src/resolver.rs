//! Per-log block resolution with rate-limit backoff

use crate::error::RpcError;
use crate::model::ResolvedBlock;
use crate::rpc::ChainClient;
use alloy::primitives::B256;
use std::sync::Arc;
use std::time::Duration;

/// Resolves a log's block, retrying only when the endpoint throttles.
///
/// After rate-limited attempt `n` the resolver waits `n * backoff_unit` before
/// trying again. Every call fetches independently; nothing is cached.
#[derive(Clone)]
pub struct BlockResolver {
    client: Arc<dyn ChainClient>,
    max_retries: u32,
    backoff_unit: Duration,
}

impl BlockResolver {
    /// `max_retries` is the total number of attempts and is at least 1
    pub fn new(client: Arc<dyn ChainClient>, max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            client,
            max_retries: max_retries.max(1),
            backoff_unit,
        }
    }

    pub async fn resolve(&self, hash: B256) -> Result<ResolvedBlock, RpcError> {
        let mut attempt = 1;
        loop {
            match self.client.block_by_hash(hash).await {
                Ok(block) => return Ok(block),
                Err(e) if !e.is_rate_limited() => return Err(e),
                Err(e) if attempt >= self.max_retries => {
                    return Err(RpcError::RetriesExhausted {
                        retries: self.max_retries,
                        last: Box::new(e),
                    })
                }
                Err(_) => {
                    let backoff = self.backoff_unit * attempt;
                    tracing::warn!(
                        "Rate limit exceeded fetching block {:#x}, retrying in {:?} ({}/{})",
                        hash,
                        backoff,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{block_for, MockChainClient};
    use tokio::time::Instant;

    fn rate_limited() -> Result<ResolvedBlock, RpcError> {
        Err(RpcError::RateLimited("429 Too Many Requests".to_string()))
    }

    fn resolver(client: &Arc<MockChainClient>, max_retries: u32) -> BlockResolver {
        BlockResolver::new(client.clone(), max_retries, Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_rate_limits() {
        let hash = B256::repeat_byte(1);
        let client = Arc::new(
            MockChainClient::new(0).script_block(hash, vec![rate_limited(), rate_limited()]),
        );

        let start = Instant::now();
        let block = resolver(&client, 5).resolve(hash).await.unwrap();

        assert_eq!(block, block_for(hash));
        assert_eq!(client.block_calls(), 3);
        // 1s after the first attempt, 2s after the second, nothing after success
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_error_is_not_retried() {
        let hash = B256::repeat_byte(2);
        let client = Arc::new(MockChainClient::new(0).script_block(
            hash,
            vec![Err(RpcError::Provider("header not found".to_string()))],
        ));

        let start = Instant::now();
        let err = resolver(&client, 5).resolve(hash).await.unwrap_err();

        assert!(matches!(err, RpcError::Provider(_)));
        assert_eq!(client.block_calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_not_found_is_not_retried() {
        let hash = B256::repeat_byte(3);
        let client = Arc::new(
            MockChainClient::new(0).script_block(hash, vec![Err(RpcError::BlockNotFound(hash))]),
        );

        let err = resolver(&client, 5).resolve(hash).await.unwrap_err();
        assert!(matches!(err, RpcError::BlockNotFound(h) if h == hash));
        assert_eq!(client.block_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_retries() {
        let hash = B256::repeat_byte(4);
        let client = Arc::new(MockChainClient::new(0).script_block(
            hash,
            (0..5).map(|_| rate_limited()).collect(),
        ));

        let start = Instant::now();
        let err = resolver(&client, 5).resolve(hash).await.unwrap_err();

        match err {
            RpcError::RetriesExhausted { retries, last } => {
                assert_eq!(retries, 5);
                assert!(last.is_rate_limited());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(client.block_calls(), 5);
        // Waits follow attempts 1 through 4 only
        assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 3 + 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_still_attempts_once() {
        let hash = B256::repeat_byte(5);
        let client = Arc::new(MockChainClient::new(0));

        resolver(&client, 0).resolve(hash).await.unwrap();
        assert_eq!(client.block_calls(), 1);
    }
}
