//! The event protocol between the core and its transport.
//!
//! Every outbound payload that carries player state embeds a complete
//! [`GameSnapshot`] (both full battle states plus a monotonically
//! increasing sequence number), never a delta, so a client that missed
//! an earlier message resynchronizes from the latest one alone and
//! discards anything with a stale sequence.

use crate::catalog::Skill;
use crate::identity::PlayerId;
use crate::resolver::Effect;
use crate::session::{GameSession, RoomId};
use crate::state::{PlayerBattleState, Zone};
use serde::{Deserialize, Serialize};

/// One player's slot as seen by clients. The transient connection id
/// never leaves the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub persistent_id: PlayerId,
    pub username: String,
    pub state: PlayerBattleState,
}

/// Complete, self-sufficient view of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub room_id: RoomId,
    /// Turn sequence number; strictly increases across resolved
    /// actions within one session.
    pub seq: u32,
    pub players: Vec<PlayerView>,
    pub current_turn: PlayerId,
    pub game_over: bool,
    pub winner: Option<String>,
}

impl GameSnapshot {
    /// Capture the current state of a session.
    pub fn of(session: &GameSession) -> Self {
        Self {
            room_id: session.room_id(),
            seq: session.turn_count(),
            players: session
                .players()
                .iter()
                .map(|slot| PlayerView {
                    persistent_id: slot.persistent_id,
                    username: slot.username.clone(),
                    state: slot.state.clone(),
                })
                .collect(),
            current_turn: session.current_turn(),
            game_over: session.is_game_over(),
            winner: session.winner_name().map(str::to_string),
        }
    }
}

/// Events consumed by the core, one per client request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundEvent {
    JoinQueue { username: String },
    UseSkill,
    ActivateZone { zone: Zone },
    ReconnectProbe { persistent_id: PlayerId },
    ReconnectResume { persistent_id: PlayerId },
    RequestResync { room_id: RoomId },
}

/// Events produced by the core, addressed per connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundEvent {
    PersistentIdAssigned {
        persistent_id: PlayerId,
    },
    WaitingForOpponent,
    MatchStarted {
        snapshot: GameSnapshot,
        first_turn: PlayerId,
    },
    TurnChanged {
        owner: PlayerId,
        owner_name: String,
    },
    ActionResolved {
        turn: u32,
        actor: PlayerId,
        /// `None` when the pre-turn poison tick ended the match before
        /// a skill was drawn.
        skill: Option<Skill>,
        damage: i32,
        healing: i32,
        effects: Vec<Effect>,
        log: Vec<String>,
        snapshot: GameSnapshot,
    },
    ZoneActivated {
        who: PlayerId,
        who_name: String,
        zone: Zone,
        duration: u8,
        snapshot: GameSnapshot,
    },
    ZoneExpired {
        who: PlayerId,
        who_name: String,
        zone: Zone,
    },
    MatchOver {
        winner: String,
        snapshot: GameSnapshot,
    },
    ReconnectAvailable {
        can_reconnect: bool,
        has_active_game: bool,
    },
    ReconnectResumed {
        snapshot: GameSnapshot,
        current_turn: PlayerId,
    },
    ReconnectFailed,
    OpponentReconnected,
    OpponentDisconnected,
    /// Authoritative full-state push: answers a manual resync request
    /// and backs the lost-message safety net.
    Resync {
        snapshot: GameSnapshot,
    },
    ActionRejected {
        reason: String,
    },
}
