//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the gateway running?)
//! - /ready, /readyz - readiness (can it serve traffic?)
//!
//! Liveness always returns 200. Readiness requires the node registry to hold
//! at least one probed node when seed endpoints are configured; a deployment
//! with no seeds (signal-only) and dev mode are always ready.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::json_response;
use crate::server::AppState;

/// Health response for load balancers and the network dashboard
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Overall health status (true if the service is running)
    pub healthy: bool,
    /// 'online' or 'degraded' for dashboard display
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
    /// Seconds since process start
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    pub signal: SignalHealth,
    pub rpc: RpcHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Signal service health details
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalHealth {
    pub enabled: bool,
    pub connections: usize,
    pub groups: usize,
}

/// RPC selection health details
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHealth {
    /// Seed endpoints configured for discovery
    pub seeds_configured: usize,
    /// Nodes the registry currently knows
    pub nodes_known: usize,
    /// Most recently selected endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_endpoint: Option<String>,
    /// Failover attempts consumed since the last successful selection
    pub failover_attempts: u32,
}

/// Build health response with current state
async fn build_health_response(state: &AppState) -> HealthResponse {
    let args = &state.args;

    let (connections, groups) = match state.signal {
        Some(ref signal) => (
            signal.store.connection_count(),
            signal.groups.group_count(),
        ),
        None => (0, 0),
    };

    let seeds_configured = args.rpc_endpoint_list().len();
    let nodes_known = state.registry.len();

    // No probed node yet with seeds configured means selection would fail
    let rpc_ready = seeds_configured == 0 || nodes_known > 0;

    let error = if !rpc_ready {
        Some(format!(
            "No RPC nodes discovered yet ({seeds_configured} seed(s) configured) - selection will fail"
        ))
    } else {
        None
    };

    let status = if rpc_ready || args.dev_mode {
        "online"
    } else {
        "degraded"
    };

    HealthResponse {
        healthy: true,
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: args.node_id.to_string(),
        signal: SignalHealth {
            enabled: state.signal.is_some(),
            connections,
            groups,
        },
        rpc: RpcHealth {
            seeds_configured,
            nodes_known,
            current_endpoint: state.selector.current_endpoint().await,
            failover_attempts: state.selector.failover_attempts(),
        },
        error,
    }
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is up; the body carries detail for callers
/// that want it.
pub async fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state).await;
    json_response(StatusCode::OK, response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// 503 until discovery has produced at least one node (when seeds are
/// configured). Use for load balancer health checks.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state).await;

    let is_ready = state.args.dev_mode
        || response.rpc.seeds_configured == 0
        || response.rpc.nodes_known > 0;

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, response)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "joynet-switchboard",
    };

    json_response(StatusCode::OK, response)
}
