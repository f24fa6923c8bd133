//! GameSession: the per-room turn state machine.
//!
//! A session owns both players' battle states and the turn sequence.
//! `submit_action_with_rng` validates turn ownership and resources, runs the
//! resolution pipeline (status tick, skill draw, combat resolution,
//! win check) and hands the turn off. All action failures are
//! recoverable rejections reported back to the offending connection;
//! they never tear the session down.

use crate::chance;
use crate::identity::{ConnectionId, PlayerId};
use crate::resolver::{self, Outcome};
use crate::selector;
use crate::state::{ActiveZone, PlayerBattleState, Zone, ZONE_COST};
use crate::status::{self, StatusTick};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Default starting pool; max HP may range up to the 1000 cap.
pub const STARTING_MAX_HP: i32 = 500;

/// Identifier of a battle room (one room per session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room#{}", self.0)
    }
}

/// Recoverable action rejections. Reported only to the offending
/// connection; the session itself is untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("no active session for this connection")]
    SessionNotFound,

    #[error("it is not your turn")]
    NotYourTurn,

    #[error("the match is already over")]
    GameAlreadyOver,

    #[error("not enough MP: need {required}, have {available}")]
    InsufficientResource { required: u8, available: u8 },

    #[error("opponent slot is missing")]
    OpponentMissing,
}

/// An inbound player action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    UseSkill,
    ActivateZone(Zone),
}

/// One player's seat in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub persistent_id: PlayerId,
    /// Rebindable on reconnect; battle state is keyed by persistent id.
    pub connection_id: ConnectionId,
    pub username: String,
    pub state: PlayerBattleState,
}

/// Terminal outcome of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchOutcome {
    Winner(PlayerId),
    /// A player disconnected mid-match; no winner is declared.
    Abandoned,
}

/// What a resolved action amounted to.
#[derive(Debug, Clone)]
pub enum ResolvedAction {
    ZoneActivated { zone: Zone, duration: u8 },
    SkillUsed {
        pre_tick: StatusTick,
        /// `None` when the pre-turn poison tick ended the match and the
        /// skill step was skipped.
        outcome: Option<Outcome>,
    },
}

/// Full report of one accepted action.
#[derive(Debug, Clone)]
pub struct ActionReport {
    /// Turn sequence number after this action resolved.
    pub seq: u32,
    pub actor: PlayerId,
    pub resolved: ResolvedAction,
    pub log: Vec<String>,
    /// Set when this action ended the match.
    pub winner: Option<PlayerId>,
    /// The new turn owner; `None` when the match ended.
    pub next_turn: Option<PlayerId>,
}

impl ActionReport {
    pub fn damage(&self) -> i32 {
        match &self.resolved {
            ResolvedAction::SkillUsed {
                outcome: Some(out), ..
            } => out.damage,
            _ => 0,
        }
    }

    pub fn healing(&self) -> i32 {
        match &self.resolved {
            ResolvedAction::SkillUsed {
                outcome: Some(out), ..
            } => out.healing,
            _ => 0,
        }
    }

    pub fn skill(&self) -> Option<&crate::catalog::Skill> {
        match &self.resolved {
            ResolvedAction::SkillUsed {
                outcome: Some(out), ..
            } => Some(&out.skill),
            _ => None,
        }
    }

    pub fn zone_expired(&self) -> Option<Zone> {
        match &self.resolved {
            ResolvedAction::SkillUsed {
                outcome: Some(out), ..
            } => out.zone_expired,
            _ => None,
        }
    }
}

/// The authoritative state of one 1-vs-1 match.
#[derive(Debug, Clone)]
pub struct GameSession {
    room_id: RoomId,
    /// Always two slots; kept as a Vec so the defensive
    /// `OpponentMissing` check stays honest.
    players: Vec<PlayerSlot>,
    current_turn: PlayerId,
    turn_count: u32,
    outcome: Option<MatchOutcome>,
}

impl GameSession {
    /// Create a session for two paired players. `first` was enqueued
    /// earlier and owns the opening turn.
    pub fn new(first: PlayerSlot, second: PlayerSlot) -> Self {
        let current_turn = first.persistent_id;
        let session = Self {
            room_id: RoomId::new(),
            players: vec![first, second],
            current_turn,
            turn_count: 0,
            outcome: None,
        };
        info!(room = %session.room_id, owner = %current_turn, "session created");
        session
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn current_turn(&self) -> PlayerId {
        self.current_turn
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn is_game_over(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn players(&self) -> &[PlayerSlot] {
        &self.players
    }

    pub fn slot(&self, player: PlayerId) -> Option<&PlayerSlot> {
        self.players.iter().find(|s| s.persistent_id == player)
    }

    pub fn slot_by_connection(&self, connection: ConnectionId) -> Option<&PlayerSlot> {
        self.players.iter().find(|s| s.connection_id == connection)
    }

    pub fn opponent_of(&self, player: PlayerId) -> Option<&PlayerSlot> {
        self.players.iter().find(|s| s.persistent_id != player)
    }

    /// Direct mutable access to a player's battle state.
    ///
    /// Use with caution - direct modifications bypass the resolution
    /// pipeline. Intended for harness setup and reconnection tooling.
    pub fn state_mut(&mut self, player: PlayerId) -> Option<&mut PlayerBattleState> {
        self.players
            .iter_mut()
            .find(|s| s.persistent_id == player)
            .map(|s| &mut s.state)
    }

    /// Username of the winner, when the match ended with one.
    pub fn winner_name(&self) -> Option<&str> {
        match self.outcome {
            Some(MatchOutcome::Winner(id)) => self.slot(id).map(|s| s.username.as_str()),
            _ => None,
        }
    }

    /// Rebind a player's slot to a new live connection, leaving battle
    /// state untouched. Returns the replaced connection id.
    pub fn rebind_connection(
        &mut self,
        player: PlayerId,
        connection: ConnectionId,
    ) -> Option<ConnectionId> {
        let slot = self
            .players
            .iter_mut()
            .find(|s| s.persistent_id == player)?;
        let old = slot.connection_id;
        slot.connection_id = connection;
        debug!(room = %self.room_id, %player, old = %old, new = %connection, "slot rebound");
        Some(old)
    }

    /// Mark the session abandoned (opponent disconnected mid-match).
    /// No winner is declared.
    pub fn abandon(&mut self) {
        if self.outcome.is_none() {
            self.outcome = Some(MatchOutcome::Abandoned);
        }
    }

    /// Submit an action on behalf of a live connection, with an
    /// explicit RNG (seeded in tests; the host passes its own).
    pub fn submit_action_with_rng<R: Rng>(
        &mut self,
        connection: ConnectionId,
        action: Action,
        rng: &mut R,
    ) -> Result<ActionReport, ActionError> {
        if self.outcome.is_some() {
            return Err(ActionError::GameAlreadyOver);
        }

        // Resolve the acting player by connection at call time; turn
        // ownership itself is keyed by persistent id.
        let actor_index = self
            .players
            .iter()
            .position(|s| s.connection_id == connection)
            .ok_or(ActionError::SessionNotFound)?;
        let actor_id = self.players[actor_index].persistent_id;
        if actor_id != self.current_turn {
            return Err(ActionError::NotYourTurn);
        }

        let opponent_index = self
            .players
            .iter()
            .position(|s| s.persistent_id != actor_id)
            .ok_or(ActionError::OpponentMissing)?;

        match action {
            Action::ActivateZone(zone) => self.activate_zone(actor_index, zone, rng),
            Action::UseSkill => self.use_skill(actor_index, opponent_index, rng),
        }
    }

    fn activate_zone<R: Rng>(
        &mut self,
        actor_index: usize,
        zone: Zone,
        rng: &mut R,
    ) -> Result<ActionReport, ActionError> {
        let actor = &mut self.players[actor_index];
        if actor.state.mp < ZONE_COST {
            return Err(ActionError::InsufficientResource {
                required: ZONE_COST,
                available: actor.state.mp,
            });
        }
        actor.state.spend_mp(ZONE_COST);

        let duration = chance::zone_duration_with_rng(rng);
        actor.state.active_zone = Some(ActiveZone {
            kind: zone,
            remaining_turns: duration,
        });

        let actor_id = actor.persistent_id;
        let log = vec![format!(
            "{} enters the {zone} zone for {duration} turns.",
            actor.username
        )];
        debug!(room = %self.room_id, %actor_id, %zone, duration, "zone activated");

        // No skill resolves on a zone-activation turn; the zone
        // countdown only ticks on skill-use turns.
        let next = self.hand_off(actor_id);
        Ok(ActionReport {
            seq: self.turn_count,
            actor: actor_id,
            resolved: ResolvedAction::ZoneActivated { zone, duration },
            log,
            winner: None,
            next_turn: Some(next),
        })
    }

    fn use_skill<R: Rng>(
        &mut self,
        actor_index: usize,
        opponent_index: usize,
        rng: &mut R,
    ) -> Result<ActionReport, ActionError> {
        let actor_id = self.players[actor_index].persistent_id;
        let opponent_id = self.players[opponent_index].persistent_id;

        // Pre-turn status tick: poison may end the match before any
        // skill is drawn.
        let (tick, mut log) = {
            let actor = &mut self.players[actor_index];
            let tick = status::tick_turn_start(&actor.username, &mut actor.state);
            let log = tick.log.clone();
            (tick, log)
        };
        if tick.defeated {
            self.outcome = Some(MatchOutcome::Winner(opponent_id));
            // Terminal actions still advance the sequence so the final
            // snapshot strictly supersedes every earlier one.
            self.turn_count += 1;
            info!(room = %self.room_id, winner = %opponent_id, "match over: poison tick");
            return Ok(ActionReport {
                seq: self.turn_count,
                actor: actor_id,
                resolved: ResolvedAction::SkillUsed {
                    pre_tick: tick,
                    outcome: None,
                },
                log,
                winner: Some(opponent_id),
                next_turn: None,
            });
        }

        let zone = self.players[actor_index].state.zone_kind();
        let skill = selector::select_skill_with_rng(zone, rng);

        let (actor, opponent) = self.pair_mut(actor_index, opponent_index);
        let actor_name = actor.username.clone();
        let opponent_name = opponent.username.clone();
        let outcome = resolver::resolve_turn(
            skill,
            &mut actor.state,
            &actor_name,
            &mut opponent.state,
            &opponent_name,
            rng,
        );
        log.extend(outcome.log.iter().cloned());

        // Win check: defender before attacker, once per action, so a
        // lethal recoil after a lethal hit still credits the attacker.
        let winner = if self.players[opponent_index].state.is_defeated() {
            Some(actor_id)
        } else if self.players[actor_index].state.is_defeated() {
            Some(opponent_id)
        } else {
            None
        };

        if let Some(winner_id) = winner {
            self.outcome = Some(MatchOutcome::Winner(winner_id));
            self.turn_count += 1;
            info!(room = %self.room_id, winner = %winner_id, "match over");
            return Ok(ActionReport {
                seq: self.turn_count,
                actor: actor_id,
                resolved: ResolvedAction::SkillUsed {
                    pre_tick: tick,
                    outcome: Some(outcome),
                },
                log,
                winner,
                next_turn: None,
            });
        }

        let next = self.hand_off(actor_id);
        Ok(ActionReport {
            seq: self.turn_count,
            actor: actor_id,
            resolved: ResolvedAction::SkillUsed {
                pre_tick: tick,
                outcome: Some(outcome),
            },
            log,
            winner: None,
            next_turn: Some(next),
        })
    }

    /// Toggle turn ownership and advance the sequence number.
    fn hand_off(&mut self, actor: PlayerId) -> PlayerId {
        let next = self
            .players
            .iter()
            .find(|s| s.persistent_id != actor)
            .map(|s| s.persistent_id)
            .unwrap_or(actor);
        self.current_turn = next;
        self.turn_count += 1;
        next
    }

    fn pair_mut(&mut self, actor: usize, opponent: usize) -> (&mut PlayerSlot, &mut PlayerSlot) {
        if actor < opponent {
            let (left, right) = self.players.split_at_mut(opponent);
            (&mut left[actor], &mut right[0])
        } else {
            let (left, right) = self.players.split_at_mut(actor);
            (&mut right[0], &mut left[opponent])
        }
    }
}
