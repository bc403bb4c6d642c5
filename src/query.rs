//! Bounded-range log query

use crate::config::IngestSettings;
use crate::error::RpcError;
use crate::model::{LogFilter, RawLogEntry};
use crate::rpc::ChainClient;
use alloy::primitives::{Address, B256};

/// What one query run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    pub filter: LogFilter,
    pub logs: Vec<RawLogEntry>,
    /// Logs on the contract with the topic filter removed. Only measured when
    /// the filtered query came back empty and the fallback is enabled.
    pub unfiltered_count: Option<usize>,
}

/// Queries a contract/topic over the last `window` blocks
#[derive(Debug, Clone, Copy)]
pub struct LogQuery {
    address: Address,
    topic: B256,
    window: u64,
    topic_fallback: bool,
}

impl LogQuery {
    pub fn new(address: Address, topic: B256, settings: &IngestSettings) -> Self {
        Self {
            address,
            topic,
            window: settings.window,
            topic_fallback: settings.topic_fallback,
        }
    }

    /// Run the query over `[head - window, head]`.
    ///
    /// A failed query is fatal for the run and is not retried. An empty result
    /// is not an error; with the fallback enabled it triggers one extra query
    /// without the topic, for diagnostics only.
    pub async fn execute(
        &self,
        client: &dyn ChainClient,
        head: u64,
    ) -> Result<QueryOutcome, RpcError> {
        let filter = LogFilter::for_window(self.address, self.topic, head, self.window);

        let logs = client
            .filter_logs(&filter)
            .await
            .map_err(|e| RpcError::QueryFailed(e.to_string()))?;

        tracing::info!(
            "Found {} logs for topic {:#x} on {} in blocks {}..={}",
            logs.len(),
            self.topic,
            self.address,
            filter.from_block,
            filter.to_block
        );

        let unfiltered_count = if logs.is_empty() && self.topic_fallback {
            self.count_without_topic(client, &filter).await
        } else {
            None
        };

        Ok(QueryOutcome {
            filter,
            logs,
            unfiltered_count,
        })
    }

    async fn count_without_topic(
        &self,
        client: &dyn ChainClient,
        filter: &LogFilter,
    ) -> Option<usize> {
        tracing::info!("No logs found with topic filter, querying without topics...");
        match client.filter_logs(&filter.without_topic()).await {
            Ok(logs) => {
                tracing::info!("Found {} logs on {} without topic filter", logs.len(), self.address);
                Some(logs.len())
            }
            Err(e) => {
                tracing::warn!("Topic-less query failed: {}", e);
                None
            }
        }
    }
}
