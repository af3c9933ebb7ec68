//! Signal service for WebRTC peer negotiation
//!
//! Peers connect over WebSocket and identify themselves with a `peerId`
//! query parameter. The connection registers a transport handle in the
//! [`SignalStore`]; offers, answers, and ICE candidates submitted through the
//! HTTP relay endpoints are forwarded to that handle as JSON frames.
//!
//! Protocol:
//! - `GET /signal?peerId={id}` - WebSocket connection for a peer
//!
//! Client frames (client -> server):
//! - `{"type": "join-group", "groupId": ...}` - join a signaling group
//! - `{"type": "keepalive"}` - refresh the idle timeout
//!
//! Server frames (server -> client):
//! - `{"type": "offer", "offer": ..., "fromPeerId": ..., "groupId": ...}`
//! - `{"type": "answer", "answer": ..., "fromPeerId": ..., "groupId": ...}`
//! - `{"type": "ice-candidate", "candidate": ..., "fromPeerId": ..., "groupId": ...}`
//! - `{"type": "group-joined", "groupId": ...}` - join ack / reconnect replay
//!
//! A second connection for a known peer id is a reconnect: it replaces the
//! registered handle (last-write-wins) and the peer's retained group
//! memberships are replayed as `group-joined` frames.

pub mod groups;
pub mod relay;
pub mod store;

pub use groups::GroupTable;
pub use relay::{ClientFrame, RelayRequest, ServerFrame, SignalKind, SignalRelay};
pub use store::{PeerHandle, SignalStore};

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::Args;

/// Default max signal connections
pub const DEFAULT_MAX_CLIENTS: usize = 32768;

/// Default idle timeout in milliseconds
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Extract the peer id from a request query string
fn peer_id_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    let params: HashMap<String, String> = serde_urlencoded::from_str(query).ok()?;
    params
        .get("peerId")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Handle WebSocket upgrade for a signal connection
pub async fn handle_signal_upgrade(
    store: Arc<SignalStore>,
    groups: Arc<GroupTable>,
    relay: Arc<SignalRelay>,
    req: hyper::Request<hyper::body::Incoming>,
    addr: SocketAddr,
    args: &Args,
) -> Response<Full<Bytes>> {
    let Some(peer_id) = peer_id_from_query(req.uri().query()) else {
        warn!("Signal: missing peerId query parameter from {}", addr);
        return Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(
                r#"{"error": "peerId query parameter is required"}"#,
            )))
            .unwrap();
    };

    if store.is_at_capacity() {
        warn!("Signal: at capacity, rejecting {}", addr);
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(r#"{"error": "Server at capacity"}"#)))
            .unwrap();
    }

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            warn!("Signal: WebSocket upgrade failed for {}: {}", addr, e);
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(format!(
                    r#"{{"error": "WebSocket upgrade failed: {e}"}}"#
                ))))
                .unwrap();
        }
    };

    let idle_timeout_ms = args
        .signal_idle_timeout_ms
        .unwrap_or(DEFAULT_IDLE_TIMEOUT_MS);

    // Spawn handler task
    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => {
                handle_signal_connection(store, groups, relay, ws, peer_id, idle_timeout_ms).await;
            }
            Err(e) => {
                warn!("Signal: WebSocket connection failed: {}", e);
            }
        }
    });

    response.map(|_| Full::new(Bytes::new()))
}

/// Handle an established signal WebSocket connection
async fn handle_signal_connection(
    store: Arc<SignalStore>,
    groups: Arc<GroupTable>,
    relay: Arc<SignalRelay>,
    ws: hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>,
    peer_id: String,
    idle_timeout_ms: u64,
) {
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // The read loop keeps its own sender for pongs and acks so they always
    // target this connection, even after a reconnect replaced the registry
    // entry.
    let local = tx.clone();
    let serial = store.insert(&peer_id, tx);

    // Writer task owns the socket's send half and drains the handle
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(msg).await.is_err() {
                break;
            }
        }
        let _ = write.close().await;
    });

    info!(peer = %peer_id, "Signal: peer connected");

    // A known peer id arriving on a fresh socket is a reconnect: the insert
    // above re-associated the handle, now replay retained membership.
    relay.replay_groups(&peer_id);

    let idle = Duration::from_millis(idle_timeout_ms);
    loop {
        let msg = match tokio::time::timeout(idle, read.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => {
                debug!(peer = %peer_id, error = %e, "Signal: read error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!(peer = %peer_id, "Signal: idle timeout");
                break;
            }
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::JoinGroup { group_id }) => {
                    groups.join(&group_id, &peer_id);
                    let ack = ServerFrame::GroupJoined {
                        group_id: group_id.clone(),
                    };
                    let _ = local.send(ack.to_message());
                    debug!(peer = %peer_id, group = %group_id, "Signal: joined group");
                }
                Ok(ClientFrame::Keepalive) => continue,
                Err(e) => {
                    debug!(peer = %peer_id, error = %e, "Signal: unrecognized frame, ignoring");
                }
            },
            Message::Ping(data) => {
                let _ = local.send(Message::Pong(data));
            }
            Message::Close(_) => break,
            _ => continue,
        }
    }

    // Cleanup: only drop the mapping if it still belongs to this connection
    if store.remove_serial(&peer_id, serial) {
        info!(peer = %peer_id, "Signal: peer disconnected");
    }
    drop(local);
    let _ = writer.await;
}
