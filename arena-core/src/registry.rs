//! Session registry and matchmaking queue.
//!
//! The registry is the single ownership boundary for shared mutable
//! matchmaking state: the FIFO waiting queue, the room map and the two
//! lookup indexes (by connection id, by persistent id). Every mutation
//! funnels through here, which is what makes the host loop the one
//! serialization point the engine needs.

use crate::identity::{ConnectionId, PlayerId};
use crate::session::{GameSession, RoomId};
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// A player waiting to be paired.
#[derive(Debug, Clone)]
pub struct WaitingPlayer {
    pub connection_id: ConnectionId,
    pub persistent_id: PlayerId,
    pub username: String,
}

/// Owns every active session and the matchmaking queue.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    waiting: VecDeque<WaitingPlayer>,
    rooms: HashMap<RoomId, GameSession>,
    by_connection: HashMap<ConnectionId, RoomId>,
    by_player: HashMap<PlayerId, RoomId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a player to the waiting queue (strict FIFO).
    pub fn enqueue(&mut self, player: WaitingPlayer) {
        debug!(connection = %player.connection_id, username = %player.username, "enqueued");
        self.waiting.push_back(player);
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether a connection is currently queued.
    pub fn is_waiting(&self, connection: ConnectionId) -> bool {
        self.waiting.iter().any(|w| w.connection_id == connection)
    }

    /// Pop the two longest-waiting players once the queue holds a pair.
    /// The first of the two was enqueued earlier and becomes the
    /// initial turn owner.
    pub fn dequeue_pair_if_available(&mut self) -> Option<(WaitingPlayer, WaitingPlayer)> {
        if self.waiting.len() < 2 {
            return None;
        }
        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        Some((first, second))
    }

    /// Drop a still-queued player (disconnect while waiting). Returns
    /// the removed entry, if the connection was queued at all.
    pub fn remove_from_queue(&mut self, connection: ConnectionId) -> Option<WaitingPlayer> {
        let index = self
            .waiting
            .iter()
            .position(|w| w.connection_id == connection)?;
        self.waiting.remove(index)
    }

    /// Register a freshly created session and index both slots.
    /// Callers must register before notifying either client, so no
    /// handler can race an unregistered room.
    pub fn register(&mut self, session: GameSession) -> RoomId {
        let room_id = session.room_id();
        for slot in session.players() {
            self.by_connection.insert(slot.connection_id, room_id);
            self.by_player.insert(slot.persistent_id, room_id);
        }
        info!(room = %room_id, "session registered");
        self.rooms.insert(room_id, session);
        room_id
    }

    pub fn room(&self, room_id: RoomId) -> Option<&GameSession> {
        self.rooms.get(&room_id)
    }

    pub fn room_mut(&mut self, room_id: RoomId) -> Option<&mut GameSession> {
        self.rooms.get_mut(&room_id)
    }

    pub fn contains_room(&self, room_id: RoomId) -> bool {
        self.rooms.contains_key(&room_id)
    }

    /// O(1) room lookup for a live connection.
    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<RoomId> {
        self.by_connection.get(&connection).copied()
    }

    /// O(1) room lookup for a persistent player id (reconnection path).
    pub fn find_by_player(&self, player: PlayerId) -> Option<RoomId> {
        self.by_player.get(&player).copied()
    }

    /// Rebind a session slot to a new connection and fix the index.
    /// Battle state is untouched. Returns false when the room or slot
    /// is unknown.
    pub fn rebind_connection(
        &mut self,
        room_id: RoomId,
        player: PlayerId,
        connection: ConnectionId,
    ) -> bool {
        let Some(session) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        let Some(old) = session.rebind_connection(player, connection) else {
            return false;
        };
        self.by_connection.remove(&old);
        self.by_connection.insert(connection, room_id);
        true
    }

    /// Remove a session (game over or disconnect teardown) and both
    /// index entries.
    pub fn remove_session(&mut self, room_id: RoomId) -> Option<GameSession> {
        let session = self.rooms.remove(&room_id)?;
        for slot in session.players() {
            self.by_connection.remove(&slot.connection_id);
            self.by_player.remove(&slot.persistent_id);
        }
        info!(room = %room_id, "session removed");
        Some(session)
    }

    pub fn active_sessions(&self) -> usize {
        self.rooms.len()
    }
}
