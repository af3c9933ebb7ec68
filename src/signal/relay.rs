//! Signaling relay
//!
//! Forwards session-negotiation messages (offer, answer, ICE candidate) to
//! the target peer's transport handle. Delivery is at-most-once and
//! best-effort: an unknown or hung-up target is a silent no-op, there is no
//! acknowledgment or retry, and no ordering is guaranteed across message
//! kinds. Peers that need delivery guarantees renegotiate at the session
//! layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

use super::groups::GroupTable;
use super::store::SignalStore;

/// The kinds of signaling message the relay forwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// A relay submission: opaque payload, target peer, group context.
///
/// The payload field accepts the kind-specific name used on the wire
/// (`offer`, `answer`, `candidate`) as well as plain `payload`. When no
/// explicit sender is given the target peer id is used as `fromPeerId`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    #[serde(
        alias = "offer",
        alias = "answer",
        alias = "candidate",
        default = "Value::default"
    )]
    pub payload: Value,
    pub peer_id: String,
    pub group_id: String,
    #[serde(default)]
    pub from_peer_id: Option<String>,
}

/// Frames pushed to a peer over its WebSocket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Offer {
        offer: Value,
        from_peer_id: String,
        group_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Answer {
        answer: Value,
        from_peer_id: String,
        group_id: String,
    },
    #[serde(rename_all = "camelCase")]
    IceCandidate {
        candidate: Value,
        from_peer_id: String,
        group_id: String,
    },
    /// Membership replay on (re)connect and join acknowledgment
    #[serde(rename_all = "camelCase")]
    GroupJoined { group_id: String },
}

impl ServerFrame {
    /// Serialize into a WebSocket text message
    pub fn to_message(&self) -> Message {
        Message::Text(serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string()))
    }
}

/// Frames accepted from a peer over its WebSocket
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    JoinGroup { group_id: String },
    Keepalive,
}

/// Relays signaling messages between registered peers
pub struct SignalRelay {
    store: Arc<SignalStore>,
    groups: Arc<GroupTable>,
}

impl SignalRelay {
    pub fn new(store: Arc<SignalStore>, groups: Arc<GroupTable>) -> Self {
        Self { store, groups }
    }

    /// Forward an offer to its target peer
    pub fn relay_offer(&self, request: RelayRequest) {
        self.deliver(SignalKind::Offer, request);
    }

    /// Forward an answer to its target peer
    pub fn relay_answer(&self, request: RelayRequest) {
        self.deliver(SignalKind::Answer, request);
    }

    /// Forward an ICE candidate to its target peer
    pub fn relay_ice_candidate(&self, request: RelayRequest) {
        self.deliver(SignalKind::IceCandidate, request);
    }

    fn deliver(&self, kind: SignalKind, request: RelayRequest) {
        let RelayRequest {
            payload,
            peer_id,
            group_id,
            from_peer_id,
        } = request;
        let from_peer_id = from_peer_id.unwrap_or_else(|| peer_id.clone());

        let Some(handle) = self.store.get(&peer_id) else {
            debug!(
                kind = kind.as_str(),
                peer = %peer_id,
                group = %group_id,
                "Relay: target not registered, dropping"
            );
            return;
        };

        let frame = match kind {
            SignalKind::Offer => ServerFrame::Offer {
                offer: payload,
                from_peer_id,
                group_id,
            },
            SignalKind::Answer => ServerFrame::Answer {
                answer: payload,
                from_peer_id,
                group_id,
            },
            SignalKind::IceCandidate => ServerFrame::IceCandidate {
                candidate: payload,
                from_peer_id,
                group_id,
            },
        };

        if handle.send(frame.to_message()).is_err() {
            debug!(
                kind = kind.as_str(),
                peer = %peer_id,
                "Relay: target connection closing, dropped"
            );
        }
    }

    /// Replay a peer's retained group memberships to its live connection.
    ///
    /// Returns the groups replayed. Used both when a known peer's WebSocket
    /// reconnects and when the reconnect endpoint is called explicitly.
    pub fn replay_groups(&self, peer_id: &str) -> Vec<String> {
        let groups = self.groups.groups_for(peer_id);
        if groups.is_empty() {
            return groups;
        }

        if let Some(handle) = self.store.get(peer_id) {
            for group_id in &groups {
                let frame = ServerFrame::GroupJoined {
                    group_id: group_id.clone(),
                };
                let _ = handle.send(frame.to_message());
            }
            info!(
                peer = %peer_id,
                groups = groups.len(),
                "Relay: replayed group membership"
            );
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn setup() -> (Arc<SignalStore>, Arc<GroupTable>, SignalRelay) {
        let store = Arc::new(SignalStore::new(64));
        let groups = Arc::new(GroupTable::new());
        let relay = SignalRelay::new(Arc::clone(&store), Arc::clone(&groups));
        (store, groups, relay)
    }

    fn register(store: &SignalStore, peer_id: &str) -> UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        store.insert(peer_id, tx);
        rx
    }

    fn recv_json(rx: &mut UnboundedReceiver<Message>) -> Value {
        match rx.try_recv().expect("expected a frame") {
            Message::Text(text) => serde_json::from_str(&text).expect("frame is JSON"),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_relay_to_unknown_peer_is_a_noop() {
        let (_store, _groups, relay) = setup();

        // Must not panic and must not error
        relay.relay_offer(RelayRequest {
            payload: json!({"sdp": "v=0"}),
            peer_id: "ghost".into(),
            group_id: "g1".into(),
            from_peer_id: None,
        });
    }

    #[test]
    fn test_relay_offer_delivers_exactly_once_with_sender_tag() {
        let (store, _groups, relay) = setup();
        let mut rx = register(&store, "p");

        relay.relay_offer(RelayRequest {
            payload: json!({"sdp": "v=0"}),
            peer_id: "p".into(),
            group_id: "g1".into(),
            from_peer_id: None,
        });

        let frame = recv_json(&mut rx);
        assert_eq!(frame["type"], "offer");
        assert_eq!(frame["fromPeerId"], "p");
        assert_eq!(frame["groupId"], "g1");
        assert_eq!(frame["offer"]["sdp"], "v=0");

        // Exactly one delivery
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ice_candidate_reaches_only_the_target() {
        let (store, groups, relay) = setup();
        let mut rx_a = register(&store, "A");
        let mut rx_b = register(&store, "B");
        groups.join("g1", "A");
        groups.join("g1", "B");

        relay.relay_ice_candidate(RelayRequest {
            payload: json!({"candidate": "candidate:0 1 UDP 2122252543 192.0.2.1 54400 typ host"}),
            peer_id: "B".into(),
            group_id: "g1".into(),
            from_peer_id: Some("A".into()),
        });

        let frame = recv_json(&mut rx_b);
        assert_eq!(frame["type"], "ice-candidate");
        assert_eq!(frame["fromPeerId"], "A");
        assert_eq!(frame["groupId"], "g1");
        assert!(frame["candidate"]["candidate"].is_string());

        // A receives nothing
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn test_relay_answer_envelope_shape() {
        let (store, _groups, relay) = setup();
        let mut rx = register(&store, "callee");

        relay.relay_answer(RelayRequest {
            payload: json!({"sdp": "v=0", "type": "answer"}),
            peer_id: "callee".into(),
            group_id: "room-7".into(),
            from_peer_id: Some("caller".into()),
        });

        let frame = recv_json(&mut rx);
        assert_eq!(frame["type"], "answer");
        assert_eq!(frame["fromPeerId"], "caller");
        assert_eq!(frame["groupId"], "room-7");
    }

    #[test]
    fn test_relay_request_accepts_wire_field_names() {
        let request: RelayRequest = serde_json::from_str(
            r#"{"offer": {"sdp": "v=0"}, "peerId": "p", "groupId": "g"}"#,
        )
        .unwrap();
        assert_eq!(request.payload["sdp"], "v=0");
        assert_eq!(request.peer_id, "p");
        assert_eq!(request.group_id, "g");
        assert!(request.from_peer_id.is_none());

        let request: RelayRequest = serde_json::from_str(
            r#"{"candidate": {}, "peerId": "p", "groupId": "g", "fromPeerId": "q"}"#,
        )
        .unwrap();
        assert_eq!(request.from_peer_id.as_deref(), Some("q"));
    }

    #[test]
    fn test_replay_groups_sends_one_frame_per_membership() {
        let (store, groups, relay) = setup();
        groups.join("g1", "alice");
        groups.join("g2", "alice");

        // Not connected yet: membership reported, nothing delivered
        let replayed = relay.replay_groups("alice");
        assert_eq!(replayed.len(), 2);

        let mut rx = register(&store, "alice");
        let mut replayed = relay.replay_groups("alice");
        replayed.sort();
        assert_eq!(replayed, vec!["g1", "g2"]);

        let mut seen: Vec<String> = (0..2)
            .map(|_| recv_json(&mut rx)["groupId"].as_str().unwrap().to_string())
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["g1", "g2"]);
        assert!(rx.try_recv().is_err());
    }
}
