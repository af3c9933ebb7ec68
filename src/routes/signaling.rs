//! Signaling relay endpoints
//!
//! - `POST /signaling/offer` - `{offer, peerId, groupId, fromPeerId?}`
//! - `POST /signaling/answer` - `{answer, peerId, groupId, fromPeerId?}`
//! - `POST /signaling/ice-candidate` - `{candidate, peerId, groupId, fromPeerId?}`
//! - `POST /signaling/reconnect` - `{peerId}`
//!
//! All respond `{"success": true}`; failures map to `{"error": ...}` with a
//! 500. Relaying to an unknown peer is a success with no delivery — the
//! relay is best-effort by design.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::{error_response, json_response};
use crate::server::AppState;
use crate::signal::RelayRequest;

/// Parse a relay submission, mapping failures to the handler's generic error
async fn read_relay_request(
    req: Request<Incoming>,
    failure_message: &str,
) -> Result<RelayRequest, Response<Full<Bytes>>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Signaling: failed to read request body");
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                failure_message,
            ));
        }
    };

    match serde_json::from_slice(&body) {
        Ok(request) => Ok(request),
        Err(e) => {
            warn!(error = %e, "Signaling: invalid request body");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                failure_message,
            ))
        }
    }
}

fn success_response() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, serde_json::json!({ "success": true }))
}

fn signal_disabled_response() -> Response<Full<Bytes>> {
    error_response(StatusCode::SERVICE_UNAVAILABLE, "Signal service disabled")
}

/// Handle POST /signaling/offer
pub async fn handle_offer(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let Some(ref signal) = state.signal else {
        return signal_disabled_response();
    };
    let request = match read_relay_request(req, "Failed to process offer").await {
        Ok(r) => r,
        Err(response) => return response,
    };
    signal.relay.relay_offer(request);
    success_response()
}

/// Handle POST /signaling/answer
pub async fn handle_answer(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let Some(ref signal) = state.signal else {
        return signal_disabled_response();
    };
    let request = match read_relay_request(req, "Failed to process answer").await {
        Ok(r) => r,
        Err(response) => return response,
    };
    signal.relay.relay_answer(request);
    success_response()
}

/// Handle POST /signaling/ice-candidate
pub async fn handle_ice_candidate(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let Some(ref signal) = state.signal else {
        return signal_disabled_response();
    };
    let request = match read_relay_request(req, "Failed to process ICE candidate").await {
        Ok(r) => r,
        Err(response) => return response,
    };
    signal.relay.relay_ice_candidate(request);
    success_response()
}

/// Reconnect request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReconnectRequest {
    peer_id: String,
}

/// Reconnect response: which memberships were replayed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReconnectResponse {
    success: bool,
    peer_id: String,
    /// Whether the peer currently holds a live connection
    connected: bool,
    /// Retained group memberships (replayed to the live connection)
    groups: Vec<String>,
}

/// Handle POST /signaling/reconnect
///
/// Replays the peer's retained group membership to its live connection. The
/// handle re-association itself happens when the peer's new WebSocket
/// arrives (last-write-wins registration); this endpoint reports and replays
/// what the peer will get back.
pub async fn handle_reconnect(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let Some(ref signal) = state.signal else {
        return signal_disabled_response();
    };

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Signaling: failed to read reconnect body");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to initiate reconnection",
            );
        }
    };

    let request: ReconnectRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "Signaling: invalid reconnect body");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to initiate reconnection",
            );
        }
    };

    let groups = signal.relay.replay_groups(&request.peer_id);
    let connected = signal.store.contains(&request.peer_id);

    json_response(
        StatusCode::OK,
        ReconnectResponse {
            success: true,
            peer_id: request.peer_id,
            connected,
            groups,
        },
    )
}
