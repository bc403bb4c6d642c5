//! Fastest-endpoint selection

use crate::error::RpcError;
use std::time::Duration;

/// The endpoint a run will connect to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Position in the candidate list
    pub index: usize,
    pub url: String,
    pub latency: Duration,
}

/// Pick the endpoint with the lowest latency.
///
/// Ties go to the earliest candidate. An empty candidate list is an error, as
/// is a latency list that does not line up with the candidates.
pub fn select_fastest(endpoints: &[String], latencies: &[Duration]) -> Result<Selection, RpcError> {
    if endpoints.is_empty() {
        return Err(RpcError::NoEndpoints);
    }
    if endpoints.len() != latencies.len() {
        return Err(RpcError::InvalidResponse(format!(
            "{} latencies measured for {} endpoints",
            latencies.len(),
            endpoints.len()
        )));
    }

    let mut best = 0;
    for (i, latency) in latencies.iter().enumerate() {
        if *latency < latencies[best] {
            best = i;
        }
    }

    Ok(Selection {
        index: best,
        url: endpoints[best].clone(),
        latency: latencies[best],
    })
}
