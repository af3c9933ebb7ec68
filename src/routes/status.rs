//! Status endpoint
//!
//! Runtime diagnostics: signal connections, group counts, the ranked node
//! registry, selector state, and failover budget.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::json_response;
use crate::rpc::AcquisitionState;
use crate::server::AppState;

/// Signal service stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalStats {
    pub enabled: bool,
    pub connections: usize,
    pub groups: usize,
}

/// One node in the ranked registry snapshot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub endpoint: String,
    pub health_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    pub probe_successes: u32,
    pub probe_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
}

/// RPC selection stats
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcStats {
    pub selector_state: AcquisitionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_endpoint: Option<String>,
    pub consensus_required: bool,
    pub failover_attempts: u32,
    pub fallback_endpoint: String,
    pub seed_endpoints: Vec<String>,
    /// Known nodes, best first
    pub nodes: Vec<NodeSummary>,
}

/// Response for GET /status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub timestamp: String,
    pub node_id: String,
    pub mode: String,
    pub signal: SignalStats,
    pub rpc: RpcStats,
}

/// Handle GET /status
pub async fn status_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let (connections, groups) = match state.signal {
        Some(ref signal) => (
            signal.store.connection_count(),
            signal.groups.group_count(),
        ),
        None => (0, 0),
    };

    let nodes = state
        .registry
        .ranked()
        .into_iter()
        .map(|record| NodeSummary {
            health_score: record.health_score(),
            endpoint: record.endpoint,
            latency_ms: record.latency_ms,
            probe_successes: record.probe_successes,
            probe_failures: record.probe_failures,
            operator: record.operator,
        })
        .collect();

    let response = StatusResponse {
        service: "switchboard",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        node_id: state.args.node_id.to_string(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        signal: SignalStats {
            enabled: state.signal.is_some(),
            connections,
            groups,
        },
        rpc: RpcStats {
            selector_state: state.selector.state().await,
            current_endpoint: state.selector.current_endpoint().await,
            consensus_required: state.selector.consensus_required(),
            failover_attempts: state.selector.failover_attempts(),
            fallback_endpoint: state.selector.fallback_endpoint().to_string(),
            seed_endpoints: state.args.rpc_endpoint_list(),
            nodes,
        },
    };

    json_response(StatusCode::OK, response)
}
