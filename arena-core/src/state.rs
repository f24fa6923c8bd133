//! Per-player battle state: HP/MP pools, the active zone and timed
//! status effects.
//!
//! All arithmetic helpers clamp at the documented bounds so callers can
//! never drive a state out of its invariants:
//! `0 <= hp <= max_hp <= 1000`, `0 <= mp <= 5`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MP pool ceiling.
pub const MP_MAX: u8 = 5;

/// MP cost of activating a zone.
pub const ZONE_COST: u8 = 5;

/// Hard ceiling on max HP growth.
pub const HP_CAP: i32 = 1000;

/// A timed modifier on a player's skill-draw pool and turn economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Zone {
    /// Restricts the draw pool to high-power skills; risks backlash.
    Offense,
    /// Restricts the draw toward heals and growth; damage taken is reduced.
    Focus,
    /// Attacks only; MP regeneration is suppressed.
    Frenzy,
    /// Bypasses the pool entirely: 50/50 ultimate or nothing.
    Gamble,
}

impl Zone {
    pub fn name(&self) -> &'static str {
        match self {
            Zone::Offense => "Offense",
            Zone::Focus => "Focus",
            Zone::Frenzy => "Frenzy",
            Zone::Gamble => "Gamble",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An active zone with its remaining duration.
///
/// A player with no zone holds `None` rather than a zero-duration
/// record, so "type = none <=> remaining = 0" holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveZone {
    pub kind: Zone,
    /// Remaining skill-use turns; always >= 1 while the record exists.
    pub remaining_turns: u8,
}

/// Poison damage applied at the start of each of the victim's turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoisonStatus {
    pub damage_per_turn: i32,
    pub turns_remaining: u8,
}

/// Extra MP granted during the post-resolution regeneration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpRegenBonus {
    pub amount: u8,
    pub turns_remaining: u8,
}

/// The full battle state of one player slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerBattleState {
    pub hp: i32,
    pub max_hp: i32,
    pub mp: u8,
    pub active_zone: Option<ActiveZone>,
    pub poison: Option<PoisonStatus>,
    pub mp_regen_bonus: Option<MpRegenBonus>,
    /// Combat-stance flags. Stored and forwarded in every snapshot;
    /// presentation layers read them, core resolution does not.
    pub reflect_ready: bool,
    pub counter_ready: bool,
    pub destiny_bond_ready: bool,
    /// Finishing-move readiness flag, reserved for presentation.
    pub is_riichi: bool,
}

impl PlayerBattleState {
    /// Fresh state: full HP, empty MP, no zone or statuses.
    pub fn new(max_hp: i32) -> Self {
        let max_hp = max_hp.clamp(1, HP_CAP);
        Self {
            hp: max_hp,
            max_hp,
            mp: 0,
            active_zone: None,
            poison: None,
            mp_regen_bonus: None,
            reflect_ready: false,
            counter_ready: false,
            destiny_bond_ready: false,
            is_riichi: false,
        }
    }

    /// The kind of the active zone, if any.
    pub fn zone_kind(&self) -> Option<Zone> {
        self.active_zone.map(|z| z.kind)
    }

    pub fn is_defeated(&self) -> bool {
        self.hp <= 0
    }

    /// Apply damage, flooring HP at 0. Returns the amount actually dealt.
    pub fn take_damage(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    /// Heal up to `max_hp`. Returns the amount actually restored.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let amount = amount.max(0);
        let healed = amount.min(self.max_hp - self.hp);
        self.hp += healed;
        healed
    }

    /// Gain MP, capped at [`MP_MAX`]. Returns the amount actually gained.
    pub fn gain_mp(&mut self, amount: u8) -> u8 {
        let gained = amount.min(MP_MAX - self.mp);
        self.mp += gained;
        gained
    }

    /// Spend MP if available. Returns false (and leaves the pool
    /// untouched) when short.
    pub fn spend_mp(&mut self, cost: u8) -> bool {
        if self.mp < cost {
            return false;
        }
        self.mp -= cost;
        true
    }

    /// Grow max HP, capped at [`HP_CAP`]. Returns the actual growth.
    pub fn grow_max_hp(&mut self, boost: i32) -> i32 {
        let boost = boost.max(0);
        let granted = boost.min(HP_CAP - self.max_hp);
        self.max_hp += granted;
        granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_starts_full() {
        let state = PlayerBattleState::new(500);
        assert_eq!(state.hp, 500);
        assert_eq!(state.max_hp, 500);
        assert_eq!(state.mp, 0);
        assert!(state.active_zone.is_none());
        assert!(!state.is_defeated());
    }

    #[test]
    fn test_take_damage_floors_at_zero() {
        let mut state = PlayerBattleState::new(500);
        assert_eq!(state.take_damage(120), 120);
        assert_eq!(state.hp, 380);
        assert_eq!(state.take_damage(1000), 380);
        assert_eq!(state.hp, 0);
        assert!(state.is_defeated());
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut state = PlayerBattleState::new(500);
        state.take_damage(60);
        assert_eq!(state.heal(40), 40);
        assert_eq!(state.heal(100), 20);
        assert_eq!(state.hp, 500);
    }

    #[test]
    fn test_mp_bounds() {
        let mut state = PlayerBattleState::new(500);
        assert_eq!(state.gain_mp(3), 3);
        assert_eq!(state.gain_mp(4), 2);
        assert_eq!(state.mp, MP_MAX);
        assert!(state.spend_mp(ZONE_COST));
        assert_eq!(state.mp, 0);
        assert!(!state.spend_mp(1));
        assert_eq!(state.mp, 0);
    }

    #[test]
    fn test_max_hp_growth_capped() {
        let mut state = PlayerBattleState::new(950);
        assert_eq!(state.grow_max_hp(80), 50);
        assert_eq!(state.max_hp, HP_CAP);
        assert_eq!(state.grow_max_hp(10), 0);
    }
}
