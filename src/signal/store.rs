//! Signal connection registry
//!
//! Maps peer identifiers to live transport handles. A handle is the sending
//! half of the connection's outbound channel; the WebSocket write loop owns
//! the socket and drains the channel, so delivering through a handle never
//! blocks on I/O.
//!
//! Registration is last-write-wins: a fresh connection for a known peer id
//! replaces the old handle (this is the reconnect path). Each entry carries a
//! connection serial so a stale connection's cleanup cannot evict the handle
//! that replaced it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Transport handle for a connected peer
pub type PeerHandle = mpsc::UnboundedSender<Message>;

/// Connection entry in the registry
struct PeerEntry {
    /// Outbound channel to the connection's write loop
    handle: PeerHandle,
    /// Serial of the connection that registered this entry
    serial: u64,
    #[allow(dead_code)]
    connected_at: DateTime<Utc>,
}

/// Registry of live peer connections, indexed by peer identifier
pub struct SignalStore {
    peers: DashMap<String, PeerEntry>,
    count: AtomicUsize,
    next_serial: AtomicU64,
    max_connections: usize,
}

impl SignalStore {
    /// Create a new registry with the given capacity
    pub fn new(max_connections: usize) -> Self {
        Self {
            peers: DashMap::new(),
            count: AtomicUsize::new(0),
            next_serial: AtomicU64::new(1),
            max_connections,
        }
    }

    /// Check if the registry is at capacity
    pub fn is_at_capacity(&self) -> bool {
        self.count.load(Ordering::Relaxed) >= self.max_connections
    }

    /// Get the current connection count
    pub fn connection_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Register a transport handle for a peer, replacing any existing one.
    ///
    /// Returns the serial assigned to this connection; pass it back to
    /// [`remove_serial`](Self::remove_serial) on cleanup.
    pub fn insert(&self, peer_id: &str, handle: PeerHandle) -> u64 {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let entry = PeerEntry {
            handle,
            serial,
            connected_at: Utc::now(),
        };

        let was_present = self.peers.insert(peer_id.to_string(), entry).is_some();
        if !was_present {
            self.count.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            peer = %peer_id,
            replaced = was_present,
            count = self.count.load(Ordering::Relaxed),
            "Signal store: registered connection"
        );

        serial
    }

    /// Remove a peer's handle unconditionally. Idempotent.
    pub fn remove(&self, peer_id: &str) {
        if self.peers.remove(peer_id).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
            debug!(
                peer = %peer_id,
                count = self.count.load(Ordering::Relaxed),
                "Signal store: removed connection"
            );
        }
    }

    /// Remove a peer's handle only if it still belongs to the connection
    /// identified by `serial`. Returns true if the entry was removed.
    ///
    /// A connection that was replaced by a reconnect must not tear down the
    /// replacement on its way out.
    pub fn remove_serial(&self, peer_id: &str, serial: u64) -> bool {
        let removed = self
            .peers
            .remove_if(peer_id, |_, entry| entry.serial == serial)
            .is_some();
        if removed {
            self.count.fetch_sub(1, Ordering::Relaxed);
            debug!(
                peer = %peer_id,
                count = self.count.load(Ordering::Relaxed),
                "Signal store: removed connection"
            );
        }
        removed
    }

    /// Get the transport handle for a peer
    pub fn get(&self, peer_id: &str) -> Option<PeerHandle> {
        self.peers.get(peer_id).map(|entry| entry.handle.clone())
    }

    /// Check if a peer is connected
    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_handle() -> (PeerHandle, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_insert_and_get() {
        let store = SignalStore::new(10);
        let (tx, _rx) = make_handle();

        assert!(!store.contains("alice"));
        store.insert("alice", tx);
        assert!(store.contains("alice"));
        assert!(store.get("alice").is_some());
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn test_insert_is_last_write_wins() {
        let store = SignalStore::new(10);
        let (tx1, _rx1) = make_handle();
        let (tx2, mut rx2) = make_handle();

        store.insert("alice", tx1);
        store.insert("alice", tx2);

        // Count unchanged, and the live handle is the second one
        assert_eq!(store.connection_count(), 1);
        store
            .get("alice")
            .unwrap()
            .send(Message::Text("hi".into()))
            .unwrap();
        assert!(rx2.try_recv().is_ok());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = SignalStore::new(10);
        let (tx, _rx) = make_handle();

        store.insert("alice", tx);
        store.remove("alice");
        store.remove("alice");

        assert!(!store.contains("alice"));
        assert_eq!(store.connection_count(), 0);
    }

    #[test]
    fn test_stale_serial_cannot_evict_replacement() {
        let store = SignalStore::new(10);
        let (tx1, _rx1) = make_handle();
        let (tx2, _rx2) = make_handle();

        let old_serial = store.insert("alice", tx1);
        let _new_serial = store.insert("alice", tx2);

        // The replaced connection's cleanup runs late and must be a no-op
        assert!(!store.remove_serial("alice", old_serial));
        assert!(store.contains("alice"));
        assert_eq!(store.connection_count(), 1);
    }

    #[test]
    fn test_capacity() {
        let store = SignalStore::new(1);
        assert!(!store.is_at_capacity());

        let (tx, _rx) = make_handle();
        store.insert("alice", tx);
        assert!(store.is_at_capacity());

        store.remove("alice");
        assert!(!store.is_at_capacity());
    }
}
