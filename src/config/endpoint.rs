//! RPC endpoint configuration

use serde::{Deserialize, Serialize};

/// A candidate RPC endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// RPC URL
    pub url: String,
    /// Optional note about the endpoint
    #[serde(default)]
    pub note: Option<String>,
    /// Whether this endpoint takes part in the latency race
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EndpointConfig {
    /// Create a new enabled endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            note: None,
            enabled: true,
        }
    }

    /// Builder-style setter for note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Builder-style setter for enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Collect the URLs of enabled endpoints, dropping blanks and duplicates while
/// keeping first-seen order.
pub fn enabled_urls(endpoints: &[EndpointConfig]) -> Vec<String> {
    let mut urls: Vec<String> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints.iter().filter(|e| e.enabled) {
        let url = endpoint.url.trim();
        if !url.is_empty() && !urls.iter().any(|u| u == url) {
            urls.push(url.to_string());
        }
    }
    urls
}
