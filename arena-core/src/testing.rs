//! Testing utilities for the battle engine.
//!
//! [`TestHarness`] drives a synchronous [`ArenaHost`] with a seeded
//! RNG and collects every delivery, so integration tests can script
//! whole matches deterministically and inspect exactly what each
//! connection would have received.

use crate::events::{GameSnapshot, InboundEvent, OutboundEvent};
use crate::host::{ArenaHost, Delivery};
use crate::identity::{ConnectionId, PlayerId};
use crate::session::RoomId;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;

/// A scripted driver around one host.
pub struct TestHarness {
    pub host: ArenaHost,
    rng: StdRng,
    inbox: Vec<Delivery>,
    assigned: HashMap<ConnectionId, PlayerId>,
}

impl TestHarness {
    /// Fresh harness with a seeded RNG.
    pub fn new(seed: u64) -> Self {
        Self {
            host: ArenaHost::new(),
            rng: StdRng::seed_from_u64(seed),
            inbox: Vec::new(),
            assigned: HashMap::new(),
        }
    }

    /// Harness with two players already connected, joined and matched.
    /// Returns the harness plus both connections, first-turn owner
    /// first.
    pub fn pair(seed: u64) -> (Self, ConnectionId, ConnectionId) {
        let mut harness = Self::new(seed);
        let a = harness.connect_and_join("alice");
        let b = harness.connect_and_join("bob");
        (harness, a, b)
    }

    /// Open a connection, capturing any assigned persistent id.
    pub fn connect(&mut self, stored: Option<PlayerId>) -> ConnectionId {
        let (connection, deliveries) = self.host.connect(stored);
        for (target, event) in &deliveries {
            if let OutboundEvent::PersistentIdAssigned { persistent_id } = event {
                self.assigned.insert(*target, *persistent_id);
            }
        }
        if let Some(player) = stored {
            self.assigned.insert(connection, player);
        }
        self.inbox.extend(deliveries);
        connection
    }

    /// Connect and enter the matchmaking queue in one step.
    pub fn connect_and_join(&mut self, username: &str) -> ConnectionId {
        let connection = self.connect(None);
        self.send(
            connection,
            InboundEvent::JoinQueue {
                username: username.to_string(),
            },
        );
        connection
    }

    /// Feed an inbound event through the host with the seeded RNG.
    pub fn send(&mut self, connection: ConnectionId, event: InboundEvent) {
        let deliveries = self.host.handle_with_rng(connection, event, &mut self.rng);
        self.inbox.extend(deliveries);
    }

    pub fn disconnect(&mut self, connection: ConnectionId) {
        let deliveries = self.host.disconnect(connection);
        self.inbox.extend(deliveries);
    }

    /// Take every delivery collected so far.
    pub fn drain(&mut self) -> Vec<Delivery> {
        std::mem::take(&mut self.inbox)
    }

    /// Take the events addressed to one connection, preserving order.
    pub fn drain_for(&mut self, connection: ConnectionId) -> Vec<OutboundEvent> {
        let (mine, rest): (Vec<Delivery>, Vec<Delivery>) = std::mem::take(&mut self.inbox)
            .into_iter()
            .partition(|(target, _)| *target == connection);
        self.inbox = rest;
        mine.into_iter().map(|(_, event)| event).collect()
    }

    /// The persistent id a connection was assigned (or presented).
    pub fn player_of(&self, connection: ConnectionId) -> PlayerId {
        self.assigned
            .get(&connection)
            .copied()
            .or_else(|| self.host.resolve_player(connection))
            .expect("connection has no identity")
    }

    pub fn room_of(&self, connection: ConnectionId) -> Option<RoomId> {
        self.host.registry().find_by_connection(connection)
    }

    /// Authoritative snapshot of the room a connection sits in.
    pub fn snapshot_of(&self, connection: ConnectionId) -> Option<GameSnapshot> {
        let room = self.room_of(connection)?;
        self.host.registry().room(room).map(GameSnapshot::of)
    }

    /// The connection whose player currently owns the turn.
    pub fn owner_connection(&self, connection: ConnectionId) -> Option<ConnectionId> {
        let room = self.room_of(connection)?;
        let session = self.host.registry().room(room)?;
        session
            .slot(session.current_turn())
            .map(|slot| slot.connection_id)
    }
}
