//! Node discovery by health probing
//!
//! A probe is a JSON-RPC `eth_blockNumber` round trip: the node must answer
//! with a result within the timeout to count as alive, and the elapsed time
//! is its latency measurement. Probing the configured seed list IS discovery
//! — every cycle refreshes the registry the selector ranks.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::registry::NodeRegistry;

/// Probes RPC endpoints and records results in the registry
pub struct NodeProber {
    client: reqwest::Client,
}

impl NodeProber {
    /// Create a prober whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }

    /// Probe a single endpoint, returning its latency on success
    pub async fn probe(&self, endpoint: &str) -> Option<Duration> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_blockNumber",
            "params": [],
        });

        let start = Instant::now();
        match self.client.post(endpoint).json(&body).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<serde_json::Value>().await {
                    Ok(value) if value.get("result").is_some() => Some(start.elapsed()),
                    Ok(value) => {
                        debug!(
                            endpoint = %endpoint,
                            response = %value,
                            "Probe: no result in JSON-RPC response"
                        );
                        None
                    }
                    Err(e) => {
                        debug!(endpoint = %endpoint, error = %e, "Probe: invalid JSON response");
                        None
                    }
                }
            }
            Ok(response) => {
                debug!(
                    endpoint = %endpoint,
                    status = %response.status(),
                    "Probe: non-success status"
                );
                None
            }
            Err(e) => {
                debug!(endpoint = %endpoint, error = %e, "Probe: request failed");
                None
            }
        }
    }

    /// Probe every seed endpoint and record the outcome in the registry.
    ///
    /// Returns (successes, failures).
    pub async fn probe_all(&self, seeds: &[String], registry: &NodeRegistry) -> (usize, usize) {
        let mut success = 0;
        let mut failure = 0;

        for endpoint in seeds {
            match self.probe(endpoint).await {
                Some(latency) => {
                    registry.record_success(endpoint, latency);
                    success += 1;
                }
                None => {
                    registry.record_failure(endpoint);
                    failure += 1;
                }
            }
        }

        if !seeds.is_empty() {
            debug!(success, failure, "Completed node probe cycle");
        }
        (success, failure)
    }
}

/// Spawn the background probe loop that keeps the registry warm between
/// selections. Probes immediately, then on the fixed interval.
pub fn spawn_probe_task(
    prober: Arc<NodeProber>,
    seeds: Vec<String>,
    registry: Arc<NodeRegistry>,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            prober.probe_all(&seeds, &registry).await;
            tokio::time::sleep(interval).await;
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Node probe task started"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_probe_all_with_empty_seed_list_is_a_noop() {
        let prober = NodeProber::new(Duration::from_millis(100));
        let registry = NodeRegistry::new();

        let (success, failure) = prober.probe_all(&[], &registry).await;
        assert_eq!((success, failure), (0, 0));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_recorded_as_failure() {
        let prober = NodeProber::new(Duration::from_millis(200));
        let registry = NodeRegistry::new();

        // Reserved TEST-NET address, nothing listens there
        let seeds = vec!["http://192.0.2.1:1/".to_string()];
        let (success, failure) = prober.probe_all(&seeds, &registry).await;

        assert_eq!(success, 0);
        assert_eq!(failure, 1);
        let record = registry.get("http://192.0.2.1:1/").unwrap();
        assert_eq!(record.probe_failures, 1);
        assert!(record.latency_ms.is_none());
    }
}
