//! The static skill catalog.
//!
//! Skills are immutable data the engine consumes; nothing in the core
//! ever mutates this table. Two reserved ids exist solely for the
//! Gamble zone draw and are excluded from every normal pool.

use crate::state::Zone;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable catalog identifier for a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkillId(pub u16);

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "skill#{}", self.0)
    }
}

/// Reserved id: the Gamble-zone high-power ultimate.
pub const GAMBLE_ULTIMATE: SkillId = SkillId(900);

/// Reserved id: the Gamble-zone no-op outcome.
pub const GAMBLE_NOTHING: SkillId = SkillId(901);

/// Broad skill category driving the resolver's dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    Attack,
    Heal,
    Buff,
    Special,
}

/// Closed set of skill behaviors with strongly-typed parameters.
///
/// The resolver dispatches on this in a single match; there are no
/// loosely-typed effect tags anywhere in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum SkillEffect {
    /// Plain skill, no modifier.
    None,
    /// Chance-gated second identical hit.
    MultiHit { chance: f64 },
    /// Attacker takes a fraction of the dealt (or declared-base) damage.
    Recoil { fraction: f64, of_dealt: bool },
    /// Attacker heals a fraction of the damage dealt.
    Drain { fraction: f64 },
    /// Max HP grows alongside the damage dealt; HP is topped up by the
    /// actual grant.
    MaxHpBoostWithDamage { boost: i32 },
    /// Grants an MP regeneration bonus to the attacker.
    MpRegen { amount: u8, turns: u8 },
    /// Poisons the defender.
    Poison { damage_per_turn: i32, turns: u8 },
    /// One-turn charge stance; log-only at this layer.
    Charge,
    /// One-turn protect stance; log-only at this layer.
    Protect,
    /// Max HP growth, optionally healing by the granted amount.
    MaxHpBoost { boost: i32, heal: bool },
}

/// An immutable catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: SkillId,
    pub name: String,
    pub kind: SkillKind,
    pub power: i32,
    /// Probability the skill connects; `None` means it always hits.
    pub hit_rate: Option<f64>,
    pub effect: SkillEffect,
}

impl Skill {
    fn new(
        id: u16,
        name: &str,
        kind: SkillKind,
        power: i32,
        hit_rate: Option<f64>,
        effect: SkillEffect,
    ) -> Self {
        Self {
            id: SkillId(id),
            name: name.to_string(),
            kind,
            power,
            hit_rate,
            effect,
        }
    }

    /// Whether this skill grows the user's max HP (Focus-zone draw
    /// criterion alongside heals and buffs).
    pub fn grows_max_hp(&self) -> bool {
        matches!(
            self.effect,
            SkillEffect::MaxHpBoost { .. } | SkillEffect::MaxHpBoostWithDamage { .. }
        )
    }

    /// Whether this skill satisfies the draw filter of the given zone.
    pub fn matches_zone(&self, zone: Zone) -> bool {
        match zone {
            Zone::Offense => self.power >= 50,
            Zone::Focus => {
                matches!(self.kind, SkillKind::Heal | SkillKind::Buff) || self.grows_max_hp()
            }
            Zone::Frenzy => self.kind == SkillKind::Attack,
            // Gamble never filters the normal pool; it short-circuits.
            Zone::Gamble => true,
        }
    }

    /// Reserved Gamble-draw skills never appear in a normal pool.
    pub fn is_gamble_reserved(&self) -> bool {
        self.id == GAMBLE_ULTIMATE || self.id == GAMBLE_NOTHING
    }
}

lazy_static::lazy_static! {
    /// The full skill table, reserved Gamble outcomes included.
    pub static ref SKILLS: Vec<Skill> = vec![
        Skill::new(1, "Strike", SkillKind::Attack, 35, None, SkillEffect::None),
        Skill::new(2, "Heavy Blow", SkillKind::Attack, 55, Some(0.85), SkillEffect::None),
        Skill::new(
            3,
            "Twin Fangs",
            SkillKind::Attack,
            30,
            None,
            SkillEffect::MultiHit { chance: 0.5 },
        ),
        Skill::new(
            4,
            "Reckless Charge",
            SkillKind::Attack,
            65,
            Some(0.9),
            SkillEffect::Recoil { fraction: 0.25, of_dealt: true },
        ),
        Skill::new(
            5,
            "Leech Blade",
            SkillKind::Attack,
            40,
            None,
            SkillEffect::Drain { fraction: 0.5 },
        ),
        Skill::new(
            6,
            "Soul Feast",
            SkillKind::Attack,
            50,
            None,
            SkillEffect::MaxHpBoostWithDamage { boost: 40 },
        ),
        Skill::new(7, "Mend", SkillKind::Heal, 60, None, SkillEffect::None),
        Skill::new(8, "Great Mend", SkillKind::Heal, 110, None, SkillEffect::None),
        Skill::new(
            9,
            "Meditate",
            SkillKind::Buff,
            0,
            None,
            SkillEffect::MpRegen { amount: 1, turns: 3 },
        ),
        Skill::new(
            10,
            "Venom Mist",
            SkillKind::Buff,
            0,
            None,
            SkillEffect::Poison { damage_per_turn: 10, turns: 3 },
        ),
        Skill::new(11, "Charge Up", SkillKind::Buff, 0, None, SkillEffect::Charge),
        Skill::new(12, "Iron Guard", SkillKind::Buff, 0, None, SkillEffect::Protect),
        Skill::new(
            13,
            "Fortify",
            SkillKind::Buff,
            0,
            None,
            SkillEffect::MaxHpBoost { boost: 50, heal: false },
        ),
        Skill::new(
            14,
            "Vital Bloom",
            SkillKind::Buff,
            0,
            None,
            SkillEffect::MaxHpBoost { boost: 30, heal: true },
        ),
        Skill::new(
            GAMBLE_ULTIMATE.0,
            "Fate Breaker",
            SkillKind::Special,
            150,
            Some(0.7),
            SkillEffect::None,
        ),
        Skill::new(
            GAMBLE_NOTHING.0,
            "Empty Draw",
            SkillKind::Special,
            0,
            None,
            SkillEffect::None,
        ),
    ];
}

/// Look up a skill by id.
pub fn get(id: SkillId) -> Option<&'static Skill> {
    SKILLS.iter().find(|s| s.id == id)
}

/// Look up a skill by name, case-insensitively.
pub fn get_by_name(name: &str) -> Option<&'static Skill> {
    let name_lower = name.to_lowercase();
    SKILLS.iter().find(|s| s.name.to_lowercase() == name_lower)
}

/// The normal draw pool: the full catalog minus the two reserved
/// Gamble outcomes.
pub fn standard_pool() -> Vec<&'static Skill> {
    SKILLS.iter().filter(|s| !s.is_gamble_reserved()).collect()
}

/// The reserved Gamble ultimate.
pub fn gamble_ultimate() -> &'static Skill {
    get(GAMBLE_ULTIMATE).expect("reserved ultimate missing from catalog")
}

/// The reserved Gamble no-op.
pub fn gamble_nothing() -> &'static Skill {
    get(GAMBLE_NOTHING).expect("reserved no-op missing from catalog")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids_present() {
        assert_eq!(gamble_ultimate().name, "Fate Breaker");
        assert_eq!(gamble_nothing().power, 0);
        assert!(gamble_ultimate().is_gamble_reserved());
    }

    #[test]
    fn test_standard_pool_excludes_reserved() {
        let pool = standard_pool();
        assert!(!pool.is_empty());
        assert!(pool.iter().all(|s| !s.is_gamble_reserved()));
        assert_eq!(pool.len(), SKILLS.len() - 2);
    }

    #[test]
    fn test_lookup_by_name() {
        let skill = get_by_name("heavy blow").unwrap();
        assert_eq!(skill.id, SkillId(2));
        assert!(get_by_name("no such skill").is_none());
    }

    #[test]
    fn test_zone_filters() {
        let pool = standard_pool();
        assert!(pool.iter().any(|s| s.matches_zone(Zone::Offense)));
        assert!(pool
            .iter()
            .filter(|s| s.matches_zone(Zone::Offense))
            .all(|s| s.power >= 50));
        assert!(pool
            .iter()
            .filter(|s| s.matches_zone(Zone::Frenzy))
            .all(|s| s.kind == SkillKind::Attack));
        assert!(pool
            .iter()
            .filter(|s| s.matches_zone(Zone::Focus))
            .all(|s| s.kind != SkillKind::Attack || s.grows_max_hp()));
    }

    #[test]
    fn test_unique_ids() {
        for (i, a) in SKILLS.iter().enumerate() {
            for b in SKILLS.iter().skip(i + 1) {
                assert_ne!(a.id, b.id, "duplicate id between {} and {}", a.name, b.name);
            }
        }
    }
}
