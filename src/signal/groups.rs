//! Group membership table
//!
//! Maps a group identifier to the set of peer identifiers that joined it.
//! Groups are created lazily on first join and live for the life of the
//! process. Membership survives peer disconnect so it can be replayed when
//! the peer reconnects.

use dashmap::DashMap;
use std::collections::HashSet;
use tracing::debug;

/// Group identifier → member peer identifiers
pub struct GroupTable {
    groups: DashMap<String, HashSet<String>>,
}

impl GroupTable {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
        }
    }

    /// Add a peer to a group, creating the group if needed.
    ///
    /// Idempotent: returns true only if the peer was newly added.
    pub fn join(&self, group_id: &str, peer_id: &str) -> bool {
        let mut members = self.groups.entry(group_id.to_string()).or_default();
        let added = members.insert(peer_id.to_string());
        if added {
            debug!(
                group = %group_id,
                peer = %peer_id,
                members = members.len(),
                "Group table: peer joined"
            );
        }
        added
    }

    /// Check if a peer is a member of a group
    pub fn contains(&self, group_id: &str, peer_id: &str) -> bool {
        self.groups
            .get(group_id)
            .map(|members| members.contains(peer_id))
            .unwrap_or(false)
    }

    /// List the members of a group
    pub fn members(&self, group_id: &str) -> Vec<String> {
        self.groups
            .get(group_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of members in a group (0 if the group does not exist)
    pub fn member_count(&self, group_id: &str) -> usize {
        self.groups.get(group_id).map(|m| m.len()).unwrap_or(0)
    }

    /// List every group a peer belongs to (used for reconnect replay)
    pub fn groups_for(&self, peer_id: &str) -> Vec<String> {
        self.groups
            .iter()
            .filter(|entry| entry.value().contains(peer_id))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Number of known groups
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for GroupTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_creates_group_lazily() {
        let table = GroupTable::new();
        assert_eq!(table.group_count(), 0);

        assert!(table.join("g1", "alice"));
        assert_eq!(table.group_count(), 1);
        assert!(table.contains("g1", "alice"));
    }

    #[test]
    fn test_double_join_leaves_size_unchanged() {
        let table = GroupTable::new();

        assert!(table.join("g1", "alice"));
        assert!(!table.join("g1", "alice"));

        assert_eq!(table.member_count("g1"), 1);
    }

    #[test]
    fn test_members_of_unknown_group_is_empty() {
        let table = GroupTable::new();
        assert!(table.members("nope").is_empty());
        assert_eq!(table.member_count("nope"), 0);
    }

    #[test]
    fn test_groups_for_peer() {
        let table = GroupTable::new();
        table.join("g1", "alice");
        table.join("g2", "alice");
        table.join("g2", "bob");

        let mut groups = table.groups_for("alice");
        groups.sort();
        assert_eq!(groups, vec!["g1", "g2"]);
        assert_eq!(table.groups_for("bob"), vec!["g2"]);
        assert!(table.groups_for("carol").is_empty());
    }
}
