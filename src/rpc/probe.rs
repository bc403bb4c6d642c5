//! Endpoint latency probing
//!
//! Each candidate gets a single plain HTTP GET. Any response, whatever its
//! status, counts as reachable. Failures are not dropped: they are reported
//! with the configured failure latency so output stays index-aligned with input.

use crate::config::ProbeSettings;
use crate::error::RpcError;
use futures::future::join_all;
use std::time::{Duration, Instant};

/// Races reachability checks against candidate endpoints
#[derive(Debug, Clone)]
pub struct LatencyProber {
    http: reqwest::Client,
    failure_latency: Duration,
}

impl LatencyProber {
    pub fn new(settings: ProbeSettings) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RpcError::ConnectionFailed(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            failure_latency: settings.failure_latency,
        })
    }

    /// Latency assigned to endpoints that could not be reached
    pub fn failure_latency(&self) -> Duration {
        self.failure_latency
    }

    /// Probe every endpoint concurrently; `result[i]` belongs to `endpoints[i]`
    pub async fn measure(&self, endpoints: &[String]) -> Vec<Duration> {
        join_all(endpoints.iter().map(|url| self.probe(url))).await
    }

    /// Time one reachability check
    pub async fn probe(&self, url: &str) -> Duration {
        let request = match self.http.get(url).build() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Failed to create probe request for {}: {}", url, e);
                return self.failure_latency;
            }
        };

        let start = Instant::now();
        match self.http.execute(request).await {
            Ok(_) => {
                let latency = start.elapsed();
                tracing::debug!("Probed {} in {:?}", url, latency);
                latency
            }
            Err(e) => {
                tracing::warn!("Failed to reach {}: {}", url, e);
                self.failure_latency
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn prober() -> LatencyProber {
        LatencyProber::new(ProbeSettings {
            timeout: Duration::from_millis(500),
            failure_latency: Duration::from_secs(10),
        })
        .unwrap()
    }

    /// Minimal HTTP server answering every connection with 405
    async fn spawn_http_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 405 Method Not Allowed\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                        .await;
                });
            }
        });

        format!("http://{}", addr)
    }

    /// Address with nothing listening on it
    async fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_invalid_url_gets_failure_latency() {
        let latency = prober().probe("not a url").await;
        assert_eq!(latency, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_gets_failure_latency() {
        let url = closed_port_url().await;
        assert_eq!(prober().probe(&url).await, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_any_http_status_counts_as_reachable() {
        let url = spawn_http_server().await;
        let latency = prober().probe(&url).await;
        assert!(latency < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_measure_keeps_alignment_under_failures() {
        let live = spawn_http_server().await;
        let dead = closed_port_url().await;
        let endpoints = vec![
            "::bad::".to_string(),
            live.clone(),
            dead,
            live,
        ];

        let latencies = prober().measure(&endpoints).await;

        assert_eq!(latencies.len(), endpoints.len());
        assert_eq!(latencies[0], Duration::from_secs(10));
        assert!(latencies[1] < Duration::from_secs(10));
        assert_eq!(latencies[2], Duration::from_secs(10));
        assert!(latencies[3] < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_measure_empty() {
        assert!(prober().measure(&[]).await.is_empty());
    }
}
