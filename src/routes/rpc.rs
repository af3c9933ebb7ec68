//! RPC selection and stream validation endpoints
//!
//! - `GET /rpc/best-node` - run selection, return the chosen endpoint
//! - `GET /rpc/streams/{id}/validate` - on-chain stream validation
//! - `GET /rpc/streams/{id}/data` - on-chain stream data read

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use super::{error_response, json_response};
use crate::server::AppState;
use crate::types::SwitchboardError;

/// Response for GET /rpc/best-node
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BestNodeResponse {
    endpoint: String,
}

/// Handle GET /rpc/best-node
///
/// `NoNodesAvailable` maps to 503 and an exhausted failover budget to 502 —
/// both are surfaced rather than hidden behind a generic failure.
pub async fn handle_best_node(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.selector.get_best_node().await {
        Ok(endpoint) => json_response(StatusCode::OK, BestNodeResponse { endpoint }),
        Err(SwitchboardError::NoNodesAvailable) => {
            error_response(StatusCode::SERVICE_UNAVAILABLE, "No nodes available")
        }
        Err(e @ SwitchboardError::MaxFailoverAttemptsExceeded { .. }) => {
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
        Err(e) => {
            error!(error = %e, "RPC node selection failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to select RPC node",
            )
        }
    }
}

/// Response for GET /rpc/streams/{id}/validate
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidateStreamResponse {
    stream_id: String,
    valid: bool,
}

/// Handle GET /rpc/streams/{id}/validate
///
/// Validation failures are logged and reported as `valid: false` — a broken
/// read is treated the same as an invalid stream, never an HTTP error.
pub async fn handle_validate_stream(
    state: Arc<AppState>,
    stream_id: &str,
) -> Response<Full<Bytes>> {
    let Some(ref streams) = state.streams else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Stream validator not configured",
        );
    };

    let valid = match streams.validate_stream(stream_id).await {
        Ok(valid) => valid,
        Err(e) => {
            warn!(stream = %stream_id, error = %e, "Stream validation failed");
            false
        }
    };

    json_response(
        StatusCode::OK,
        ValidateStreamResponse {
            stream_id: stream_id.to_string(),
            valid,
        },
    )
}

/// Response for GET /rpc/streams/{id}/data
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreamDataResponse {
    stream_id: String,
    data: String,
}

/// Handle GET /rpc/streams/{id}/data
pub async fn handle_stream_data(state: Arc<AppState>, stream_id: &str) -> Response<Full<Bytes>> {
    let Some(ref streams) = state.streams else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Stream validator not configured",
        );
    };

    match streams.stream_data(stream_id).await {
        Ok(data) => json_response(
            StatusCode::OK,
            StreamDataResponse {
                stream_id: stream_id.to_string(),
                data,
            },
        ),
        Err(e) => {
            error!(stream = %stream_id, error = %e, "Stream data read failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch stream data",
            )
        }
    }
}
