//! RPC node registry and health scoring
//!
//! Tracks every endpoint discovery has seen, together with its measured
//! latency and probe history. Records are scored and ranked at selection
//! time; nothing here persists across restarts.

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;

/// Latency at or above which the latency component of the score bottoms out
const MAX_SCORED_LATENCY_MS: f64 = 1000.0;

/// A known RPC node and its measured health
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcNodeRecord {
    /// JSON-RPC endpoint URL
    pub endpoint: String,
    /// On-chain operator address, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Latency of the most recent successful probe
    pub latency_ms: Option<u64>,
    pub probe_successes: u32,
    pub probe_failures: u32,
    /// Unix millis of the last probe (success or failure)
    pub last_probe_ms: Option<i64>,
}

impl RpcNodeRecord {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            operator: None,
            latency_ms: None,
            probe_successes: 0,
            probe_failures: 0,
            last_probe_ms: None,
        }
    }

    /// Probe success ratio (0.0 - 1.0), 0.5 when the node is unprobed
    pub fn reliability(&self) -> f64 {
        let total = self.probe_successes + self.probe_failures;
        if total == 0 {
            return 0.5; // Unknown health
        }
        f64::from(self.probe_successes) / f64::from(total)
    }

    /// Health score (0 - 100): latency 60%, reliability 40%.
    ///
    /// A node with no successful probe has no latency measurement and scores
    /// only on reliability, which keeps it below any responsive node.
    pub fn health_score(&self) -> f64 {
        let latency_score = match self.latency_ms {
            Some(latency) => 1.0 - (latency as f64 / MAX_SCORED_LATENCY_MS).min(1.0),
            None => 0.0,
        };
        latency_score * 60.0 + self.reliability() * 40.0
    }
}

/// Registry of known RPC nodes, indexed by endpoint
pub struct NodeRegistry {
    nodes: DashMap<String, RpcNodeRecord>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    /// Record a successful probe, creating the record if needed
    pub fn record_success(&self, endpoint: &str, latency: Duration) {
        let mut record = self
            .nodes
            .entry(endpoint.to_string())
            .or_insert_with(|| RpcNodeRecord::new(endpoint));
        record.latency_ms = Some(latency.as_millis() as u64);
        record.probe_successes += 1;
        record.last_probe_ms = Some(Utc::now().timestamp_millis());
    }

    /// Record a failed probe, creating the record if needed
    pub fn record_failure(&self, endpoint: &str) {
        let mut record = self
            .nodes
            .entry(endpoint.to_string())
            .or_insert_with(|| RpcNodeRecord::new(endpoint));
        record.probe_failures += 1;
        record.last_probe_ms = Some(Utc::now().timestamp_millis());
    }

    /// Attach an on-chain operator address to a known endpoint
    pub fn set_operator(&self, endpoint: &str, operator: &str) {
        if let Some(mut record) = self.nodes.get_mut(endpoint) {
            record.operator = Some(operator.to_string());
        }
    }

    /// Get a record by endpoint
    pub fn get(&self, endpoint: &str) -> Option<RpcNodeRecord> {
        self.nodes.get(endpoint).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Snapshot all records, sorted by health score (highest first)
    pub fn ranked(&self) -> Vec<RpcNodeRecord> {
        let mut records: Vec<RpcNodeRecord> =
            self.nodes.iter().map(|entry| entry.value().clone()).collect();
        records.sort_by(|a, b| {
            b.health_score()
                .partial_cmp(&a.health_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unprobed_record_has_neutral_reliability() {
        let record = RpcNodeRecord::new("http://node-0:8545");
        assert_eq!(record.reliability(), 0.5);
        // No latency measurement: only the reliability component contributes
        assert_eq!(record.health_score(), 20.0);
    }

    #[test]
    fn test_lower_latency_scores_higher() {
        let registry = NodeRegistry::new();
        registry.record_success("http://fast:8545", Duration::from_millis(50));
        registry.record_success("http://slow:8545", Duration::from_millis(800));

        let fast = registry.get("http://fast:8545").unwrap();
        let slow = registry.get("http://slow:8545").unwrap();
        assert!(fast.health_score() > slow.health_score());
    }

    #[test]
    fn test_failures_drag_the_score_down() {
        let registry = NodeRegistry::new();
        registry.record_success("http://flaky:8545", Duration::from_millis(50));
        let healthy_score = registry.get("http://flaky:8545").unwrap().health_score();

        registry.record_failure("http://flaky:8545");
        registry.record_failure("http://flaky:8545");
        let flaky_score = registry.get("http://flaky:8545").unwrap().health_score();

        assert!(flaky_score < healthy_score);
    }

    #[test]
    fn test_ranked_orders_by_score_descending() {
        let registry = NodeRegistry::new();
        registry.record_success("http://slow:8545", Duration::from_millis(700));
        registry.record_success("http://fast:8545", Duration::from_millis(20));
        registry.record_failure("http://dead:8545");

        let ranked = registry.ranked();
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].endpoint, "http://fast:8545");
        assert_eq!(ranked[1].endpoint, "http://slow:8545");
        assert_eq!(ranked[2].endpoint, "http://dead:8545");
    }

    #[test]
    fn test_latency_beyond_cap_scores_zero_for_latency() {
        let registry = NodeRegistry::new();
        registry.record_success("http://glacial:8545", Duration::from_millis(5000));
        let record = registry.get("http://glacial:8545").unwrap();
        // reliability 1.0 * 40 only
        assert_eq!(record.health_score(), 40.0);
    }

    #[test]
    fn test_set_operator() {
        let registry = NodeRegistry::new();
        registry.record_success("http://node-0:8545", Duration::from_millis(10));
        registry.set_operator("http://node-0:8545", "0x00000000000000000000000000000000000000a1");

        assert_eq!(
            registry.get("http://node-0:8545").unwrap().operator.as_deref(),
            Some("0x00000000000000000000000000000000000000a1")
        );
    }
}
