//! Player identity: the persistent id surviving reconnects and the
//! transient per-connection id, with the binding table between them.
//!
//! Sessions and turn ownership key by [`PlayerId`]; the live
//! [`ConnectionId`] is resolved through the binding table at call time
//! and rebound on reconnect without touching battle state.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Server-issued identifier that survives reconnects. Clients persist
/// it locally and present it on reconnection probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transient identifier for one live network connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Issues persistent ids and tracks which connection currently speaks
/// for which player.
#[derive(Debug, Default)]
pub struct IdentityManager {
    bindings: HashMap<ConnectionId, PlayerId>,
    known: HashSet<PlayerId>,
    next_connection: u64,
}

impl IdentityManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh connection id for a newly accepted connection.
    pub fn allocate_connection(&mut self) -> ConnectionId {
        self.next_connection += 1;
        ConnectionId(self.next_connection)
    }

    /// Issue a brand-new persistent id and bind it to the connection.
    pub fn issue(&mut self, connection: ConnectionId) -> PlayerId {
        let player = PlayerId::new();
        self.known.insert(player);
        self.bindings.insert(connection, player);
        info!(%connection, %player, "issued persistent id");
        player
    }

    /// Bind a connection to a previously issued (or client-presented)
    /// persistent id.
    pub fn bind(&mut self, connection: ConnectionId, player: PlayerId) {
        self.known.insert(player);
        self.bindings.insert(connection, player);
        debug!(%connection, %player, "bound connection");
    }

    /// Resolve the player currently speaking on a connection.
    pub fn resolve(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.bindings.get(&connection).copied()
    }

    /// Drop a connection's binding. The persistent id stays known so a
    /// later probe can still find it.
    pub fn unbind(&mut self, connection: ConnectionId) -> Option<PlayerId> {
        self.bindings.remove(&connection)
    }

    /// Whether this persistent id was ever issued or presented here.
    pub fn is_known(&self, player: PlayerId) -> bool {
        self.known.contains(&player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_binds_and_remembers() {
        let mut ids = IdentityManager::new();
        let conn = ids.allocate_connection();
        let player = ids.issue(conn);
        assert_eq!(ids.resolve(conn), Some(player));
        assert!(ids.is_known(player));
    }

    #[test]
    fn test_unbind_keeps_identity_known() {
        let mut ids = IdentityManager::new();
        let conn = ids.allocate_connection();
        let player = ids.issue(conn);
        assert_eq!(ids.unbind(conn), Some(player));
        assert_eq!(ids.resolve(conn), None);
        assert!(ids.is_known(player));
    }

    #[test]
    fn test_rebind_to_new_connection() {
        let mut ids = IdentityManager::new();
        let first = ids.allocate_connection();
        let player = ids.issue(first);
        ids.unbind(first);

        let second = ids.allocate_connection();
        assert_ne!(first, second);
        ids.bind(second, player);
        assert_eq!(ids.resolve(second), Some(player));
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let mut ids = IdentityManager::new();
        let a = ids.allocate_connection();
        let b = ids.allocate_connection();
        assert_ne!(a, b);
    }
}
