//! The host: single serialization point for every inbound action.
//!
//! [`ArenaHost`] is a synchronous core that fully handles one inbound
//! event (validation, resolution, broadcast fan-out) before the next is
//! accepted; it owns the identity manager and the session registry, so
//! no other code touches shared matchmaking state. The async [`spawn`]
//! loop drives a host from a tokio mailbox for concurrent hosting and
//! runs the per-room resync safety net: one cancelable timer per
//! pending turn-handoff, aborted the instant the next legitimate
//! action lands, with stale firings discarded by sequence number.

use crate::events::{GameSnapshot, InboundEvent, OutboundEvent};
use crate::identity::{ConnectionId, IdentityManager, PlayerId};
use crate::registry::{SessionRegistry, WaitingPlayer};
use crate::session::{
    Action, ActionError, GameSession, PlayerSlot, ResolvedAction, RoomId, STARTING_MAX_HP,
};
use crate::state::PlayerBattleState;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// An outbound event addressed to one connection.
pub type Delivery = (ConnectionId, OutboundEvent);

/// How long a turn-handoff may sit unanswered before the safety net
/// re-pushes the authoritative snapshot to both room members.
pub const RESYNC_AFTER: Duration = Duration::from_secs(5);

/// The authoritative battle server core.
#[derive(Debug, Default)]
pub struct ArenaHost {
    identity: IdentityManager,
    registry: SessionRegistry,
}

impl ArenaHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Mutable registry access.
    ///
    /// Use with caution - direct modifications bypass the action
    /// pipeline. Intended for harness setup and admin tooling.
    pub fn registry_mut(&mut self) -> &mut SessionRegistry {
        &mut self.registry
    }

    /// The persistent id currently speaking on a connection.
    pub fn resolve_player(&self, connection: ConnectionId) -> Option<PlayerId> {
        self.identity.resolve(connection)
    }

    /// Accept a new connection. A client presenting no stored
    /// persistent id is issued a fresh one and told to persist it.
    pub fn connect(&mut self, stored: Option<PlayerId>) -> (ConnectionId, Vec<Delivery>) {
        let connection = self.identity.allocate_connection();
        let mut deliveries = Vec::new();
        match stored {
            None => {
                let persistent_id = self.identity.issue(connection);
                deliveries.push((
                    connection,
                    OutboundEvent::PersistentIdAssigned { persistent_id },
                ));
            }
            Some(player) => {
                self.identity.bind(connection, player);
            }
        }
        (connection, deliveries)
    }

    /// Handle a dropped connection: a queued player is simply removed;
    /// a player in an unfinished match tears the session down and the
    /// survivor is notified. No winner is declared.
    pub fn disconnect(&mut self, connection: ConnectionId) -> Vec<Delivery> {
        self.identity.unbind(connection);

        if self.registry.remove_from_queue(connection).is_some() {
            debug!(%connection, "disconnected while queued");
            return Vec::new();
        }

        let Some(room) = self.registry.find_by_connection(connection) else {
            return Vec::new();
        };
        let Some(mut session) = self.registry.remove_session(room) else {
            return Vec::new();
        };
        session.abandon();
        info!(%connection, %room, "session torn down on disconnect");

        session
            .players()
            .iter()
            .filter(|slot| slot.connection_id != connection)
            .map(|slot| (slot.connection_id, OutboundEvent::OpponentDisconnected))
            .collect()
    }

    /// Handle one inbound event with the thread-local RNG.
    pub fn handle(&mut self, connection: ConnectionId, event: InboundEvent) -> Vec<Delivery> {
        self.handle_with_rng(connection, event, &mut rand::thread_rng())
    }

    /// Handle one inbound event with an explicit RNG (seeded in tests).
    pub fn handle_with_rng<R: Rng>(
        &mut self,
        connection: ConnectionId,
        event: InboundEvent,
        rng: &mut R,
    ) -> Vec<Delivery> {
        match event {
            InboundEvent::JoinQueue { username } => self.join_queue(connection, username),
            InboundEvent::UseSkill => self.submit(connection, Action::UseSkill, rng),
            InboundEvent::ActivateZone { zone } => {
                self.submit(connection, Action::ActivateZone(zone), rng)
            }
            InboundEvent::ReconnectProbe { persistent_id } => {
                self.probe(connection, persistent_id)
            }
            InboundEvent::ReconnectResume { persistent_id } => {
                self.resume(connection, persistent_id)
            }
            InboundEvent::RequestResync { room_id } => self.resync(connection, room_id),
        }
    }

    fn join_queue(&mut self, connection: ConnectionId, username: String) -> Vec<Delivery> {
        if self.registry.find_by_connection(connection).is_some()
            || self.registry.is_waiting(connection)
        {
            return vec![(
                connection,
                OutboundEvent::ActionRejected {
                    reason: "already waiting or in a match".to_string(),
                },
            )];
        }

        let mut deliveries = Vec::new();
        let persistent_id = match self.identity.resolve(connection) {
            Some(id) => id,
            None => {
                // Defensive: a transport that skipped connect() still
                // gets an identity.
                let id = self.identity.issue(connection);
                deliveries.push((
                    connection,
                    OutboundEvent::PersistentIdAssigned { persistent_id: id },
                ));
                id
            }
        };

        self.registry.enqueue(WaitingPlayer {
            connection_id: connection,
            persistent_id,
            username,
        });
        deliveries.push((connection, OutboundEvent::WaitingForOpponent));

        if let Some((first, second)) = self.registry.dequeue_pair_if_available() {
            let session = GameSession::new(Self::slot(&first), Self::slot(&second));
            info!(
                room = %session.room_id(),
                first = %first.username,
                second = %second.username,
                "matched"
            );
            // Register before either client hears about the room.
            let room = self.registry.register(session);
            let session = self
                .registry
                .room(room)
                .expect("session registered above");
            let snapshot = GameSnapshot::of(session);
            let first_turn = session.current_turn();
            for member in [&first, &second] {
                deliveries.push((
                    member.connection_id,
                    OutboundEvent::MatchStarted {
                        snapshot: snapshot.clone(),
                        first_turn,
                    },
                ));
            }
        }
        deliveries
    }

    fn submit<R: Rng>(
        &mut self,
        connection: ConnectionId,
        action: Action,
        rng: &mut R,
    ) -> Vec<Delivery> {
        let Some(room) = self.registry.find_by_connection(connection) else {
            return Self::reject(connection, &ActionError::SessionNotFound);
        };
        let Some(session) = self.registry.room_mut(room) else {
            return Self::reject(connection, &ActionError::SessionNotFound);
        };

        let report = match session.submit_action_with_rng(connection, action, rng) {
            Ok(report) => report,
            Err(error) => return Self::reject(connection, &error),
        };

        let snapshot = GameSnapshot::of(session);
        let members: Vec<ConnectionId> =
            session.players().iter().map(|s| s.connection_id).collect();
        let actor_name = session
            .slot(report.actor)
            .map(|s| s.username.clone())
            .unwrap_or_default();

        let mut deliveries = Vec::new();
        match &report.resolved {
            ResolvedAction::ZoneActivated { zone, duration } => {
                for &member in &members {
                    deliveries.push((
                        member,
                        OutboundEvent::ZoneActivated {
                            who: report.actor,
                            who_name: actor_name.clone(),
                            zone: *zone,
                            duration: *duration,
                            snapshot: snapshot.clone(),
                        },
                    ));
                }
            }
            ResolvedAction::SkillUsed { outcome, .. } => {
                let effects = outcome.as_ref().map(|o| o.effects.clone()).unwrap_or_default();
                for &member in &members {
                    deliveries.push((
                        member,
                        OutboundEvent::ActionResolved {
                            turn: report.seq,
                            actor: report.actor,
                            skill: report.skill().cloned(),
                            damage: report.damage(),
                            healing: report.healing(),
                            effects: effects.clone(),
                            log: report.log.clone(),
                            snapshot: snapshot.clone(),
                        },
                    ));
                }
                if let Some(zone) = report.zone_expired() {
                    for &member in &members {
                        deliveries.push((
                            member,
                            OutboundEvent::ZoneExpired {
                                who: report.actor,
                                who_name: actor_name.clone(),
                                zone,
                            },
                        ));
                    }
                }
            }
        }

        if report.winner.is_some() {
            let winner = snapshot.winner.clone().unwrap_or_default();
            for &member in &members {
                deliveries.push((
                    member,
                    OutboundEvent::MatchOver {
                        winner: winner.clone(),
                        snapshot: snapshot.clone(),
                    },
                ));
            }
            self.registry.remove_session(room);
        } else if let Some(owner) = report.next_turn {
            let owner_name = snapshot
                .players
                .iter()
                .find(|p| p.persistent_id == owner)
                .map(|p| p.username.clone())
                .unwrap_or_default();
            for &member in &members {
                deliveries.push((member, OutboundEvent::TurnChanged { owner, owner_name: owner_name.clone() }));
            }
        }
        deliveries
    }

    fn probe(&self, connection: ConnectionId, player: PlayerId) -> Vec<Delivery> {
        let can_reconnect = self.identity.is_known(player);
        let has_active_game = self.registry.find_by_player(player).is_some();
        vec![(
            connection,
            OutboundEvent::ReconnectAvailable {
                can_reconnect,
                has_active_game,
            },
        )]
    }

    fn resume(&mut self, connection: ConnectionId, player: PlayerId) -> Vec<Delivery> {
        let Some(room) = self.registry.find_by_player(player) else {
            return vec![(connection, OutboundEvent::ReconnectFailed)];
        };

        self.identity.bind(connection, player);
        if !self.registry.rebind_connection(room, player, connection) {
            warn!(%connection, %player, "resume found a room but no slot");
            return vec![(connection, OutboundEvent::ReconnectFailed)];
        }

        let Some(session) = self.registry.room(room) else {
            return vec![(connection, OutboundEvent::ReconnectFailed)];
        };
        let snapshot = GameSnapshot::of(session);
        info!(%connection, %player, %room, "resumed");

        let mut deliveries = vec![(
            connection,
            OutboundEvent::ReconnectResumed {
                current_turn: snapshot.current_turn,
                snapshot,
            },
        )];
        if let Some(opponent) = session.opponent_of(player) {
            deliveries.push((opponent.connection_id, OutboundEvent::OpponentReconnected));
        }
        deliveries
    }

    fn resync(&self, connection: ConnectionId, room_id: RoomId) -> Vec<Delivery> {
        let snapshot = self
            .registry
            .room(room_id)
            .filter(|session| session.slot_by_connection(connection).is_some())
            .map(GameSnapshot::of);
        match snapshot {
            Some(snapshot) => vec![(connection, OutboundEvent::Resync { snapshot })],
            None => Self::reject(connection, &ActionError::SessionNotFound),
        }
    }

    fn reject(connection: ConnectionId, error: &ActionError) -> Vec<Delivery> {
        debug!(%connection, %error, "action rejected");
        vec![(
            connection,
            OutboundEvent::ActionRejected {
                reason: error.to_string(),
            },
        )]
    }

    fn slot(waiting: &WaitingPlayer) -> PlayerSlot {
        PlayerSlot {
            persistent_id: waiting.persistent_id,
            connection_id: waiting.connection_id,
            username: waiting.username.clone(),
            state: PlayerBattleState::new(STARTING_MAX_HP),
        }
    }
}

/// A request into the host mailbox.
#[derive(Debug)]
pub enum HostRequest {
    Connect {
        stored: Option<PlayerId>,
        outbox: mpsc::UnboundedSender<OutboundEvent>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    Event {
        connection: ConnectionId,
        event: InboundEvent,
    },
}

/// Cheap handle for transports to talk to a spawned host loop.
#[derive(Debug, Clone)]
pub struct HostHandle {
    tx: mpsc::UnboundedSender<HostRequest>,
}

impl HostHandle {
    /// Register a connection and its outbox; resolves to the allocated
    /// connection id.
    pub async fn connect(
        &self,
        stored: Option<PlayerId>,
        outbox: mpsc::UnboundedSender<OutboundEvent>,
    ) -> Option<ConnectionId> {
        let (reply, on_reply) = oneshot::channel();
        self.tx
            .send(HostRequest::Connect {
                stored,
                outbox,
                reply,
            })
            .ok()?;
        on_reply.await.ok()
    }

    pub fn disconnect(&self, connection: ConnectionId) {
        let _ = self.tx.send(HostRequest::Disconnect { connection });
    }

    pub fn send(&self, connection: ConnectionId, event: InboundEvent) {
        let _ = self.tx.send(HostRequest::Event { connection, event });
    }
}

/// Spawn a host loop on the current tokio runtime.
pub fn spawn() -> (HostHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(run(rx));
    (HostHandle { tx }, handle)
}

/// Drive a host from a mailbox until every `HostHandle` is dropped.
///
/// One inbound request is fully handled before the next is received,
/// so session and registry state need no further locking.
pub async fn run(mut rx: mpsc::UnboundedReceiver<HostRequest>) {
    let mut host = ArenaHost::new();
    let mut outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<OutboundEvent>> = HashMap::new();
    let mut timers: HashMap<RoomId, JoinHandle<()>> = HashMap::new();
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<(RoomId, u32)>();

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(request) = request else { break };
                match request {
                    HostRequest::Connect { stored, outbox, reply } => {
                        let (connection, deliveries) = host.connect(stored);
                        outboxes.insert(connection, outbox);
                        dispatch(&outboxes, deliveries);
                        let _ = reply.send(connection);
                    }
                    HostRequest::Disconnect { connection } => {
                        let deliveries = host.disconnect(connection);
                        outboxes.remove(&connection);
                        dispatch(&outboxes, deliveries);
                    }
                    HostRequest::Event { connection, event } => {
                        let before = host
                            .registry()
                            .find_by_connection(connection)
                            .and_then(|room| host.registry().room(room))
                            .map(|session| (session.room_id(), session.turn_count()));
                        let deliveries = host.handle(connection, event);
                        dispatch(&outboxes, deliveries);
                        if let Some(room) = host.registry().find_by_connection(connection) {
                            if let Some(session) = host.registry().room(room) {
                                // Only an event that advanced the session
                                // (or put the connection in a fresh room)
                                // supersedes the pending handoff timer; a
                                // rejection must not push the safety net
                                // out indefinitely.
                                let seq = session.turn_count();
                                if before != Some((room, seq)) {
                                    arm_timer(&mut timers, &timer_tx, room, seq);
                                }
                            }
                        }
                    }
                }
            }
            fired = timer_rx.recv() => {
                let Some((room, seq)) = fired else { break };
                timers.remove(&room);
                match resync_deliveries(&host, room, seq) {
                    Some(deliveries) => {
                        debug!(%room, seq, "safety-net resync pushed");
                        dispatch(&outboxes, deliveries);
                    }
                    // A stale firing lost the race against a
                    // legitimate action; drop it.
                    None => debug!(%room, seq, "stale resync discarded"),
                }
            }
        }

        // Drop timers whose rooms are gone (match over or teardown).
        timers.retain(|room, handle| {
            let alive = host.registry().contains_room(*room);
            if !alive {
                handle.abort();
            }
            alive
        });
    }
}

/// Snapshot push for a safety-net firing. `None` when the room is gone
/// or the firing is stale (the sequence moved after it was armed).
fn resync_deliveries(host: &ArenaHost, room: RoomId, seq: u32) -> Option<Vec<Delivery>> {
    let session = host.registry().room(room)?;
    if session.turn_count() != seq {
        return None;
    }
    let snapshot = GameSnapshot::of(session);
    Some(
        session
            .players()
            .iter()
            .map(|slot| {
                (
                    slot.connection_id,
                    OutboundEvent::Resync {
                        snapshot: snapshot.clone(),
                    },
                )
            })
            .collect(),
    )
}

fn dispatch(
    outboxes: &HashMap<ConnectionId, mpsc::UnboundedSender<OutboundEvent>>,
    deliveries: Vec<Delivery>,
) {
    for (connection, event) in deliveries {
        if let Some(outbox) = outboxes.get(&connection) {
            // A closed outbox means the peer vanished; disconnect
            // handling will reap it.
            let _ = outbox.send(event);
        }
    }
}

/// Replace the room's pending safety-net timer with one for the
/// current sequence number.
fn arm_timer(
    timers: &mut HashMap<RoomId, JoinHandle<()>>,
    timer_tx: &mpsc::UnboundedSender<(RoomId, u32)>,
    room: RoomId,
    seq: u32,
) {
    if let Some(previous) = timers.remove(&room) {
        previous.abort();
    }
    let tx = timer_tx.clone();
    let handle = tokio::spawn(async move {
        tokio::time::sleep(RESYNC_AFTER).await;
        let _ = tx.send((room, seq));
    });
    timers.insert(room, handle);
}
