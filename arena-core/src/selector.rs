//! Zone-filtered skill selection.
//!
//! The acting player's zone shapes the draw pool; the Gamble zone
//! bypasses the pool entirely with a 50/50 binary outcome.

use crate::catalog::{self, Skill};
use crate::chance;
use crate::state::Zone;
use rand::Rng;

/// Probability the Gamble draw produces the reserved ultimate rather
/// than the reserved no-op.
pub const GAMBLE_ULTIMATE_CHANCE: f64 = 0.5;

/// Draw one skill for the given zone context.
///
/// Filtered pools that would come up empty fall back to the unfiltered
/// catalog (minus the reserved Gamble outcomes); a draw never happens
/// over an empty pool.
pub fn select_skill_with_rng<R: Rng>(zone: Option<Zone>, rng: &mut R) -> &'static Skill {
    // Gamble short-circuits all other filtering.
    if zone == Some(Zone::Gamble) {
        return if chance::check(GAMBLE_ULTIMATE_CHANCE, rng) {
            catalog::gamble_ultimate()
        } else {
            catalog::gamble_nothing()
        };
    }

    let pool = catalog::standard_pool();
    let filtered: Vec<&'static Skill> = match zone {
        Some(z) => pool.iter().copied().filter(|s| s.matches_zone(z)).collect(),
        None => Vec::new(),
    };

    let effective = if filtered.is_empty() { &pool } else { &filtered };
    *chance::pick(effective, rng).expect("skill catalog is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SkillKind, GAMBLE_NOTHING, GAMBLE_ULTIMATE};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_offense_pool_is_high_power() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let skill = select_skill_with_rng(Some(Zone::Offense), &mut rng);
            assert!(skill.power >= 50, "{} has power {}", skill.name, skill.power);
            assert!(!skill.is_gamble_reserved());
        }
    }

    #[test]
    fn test_frenzy_pool_is_attacks_only() {
        let mut rng = StdRng::seed_from_u64(2);
        for _ in 0..500 {
            let skill = select_skill_with_rng(Some(Zone::Frenzy), &mut rng);
            assert_eq!(skill.kind, SkillKind::Attack);
        }
    }

    #[test]
    fn test_focus_pool_heals_buffs_or_growth() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let skill = select_skill_with_rng(Some(Zone::Focus), &mut rng);
            assert!(
                matches!(skill.kind, SkillKind::Heal | SkillKind::Buff) || skill.grows_max_hp(),
                "{} escaped the Focus filter",
                skill.name
            );
        }
    }

    #[test]
    fn test_gamble_draws_only_reserved_ids_roughly_evenly() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut ultimates = 0usize;
        let draws = 10_000usize;
        for _ in 0..draws {
            let skill = select_skill_with_rng(Some(Zone::Gamble), &mut rng);
            assert!(skill.id == GAMBLE_ULTIMATE || skill.id == GAMBLE_NOTHING);
            if skill.id == GAMBLE_ULTIMATE {
                ultimates += 1;
            }
        }
        let ratio = ultimates as f64 / draws as f64;
        assert!(
            (0.45..=0.55).contains(&ratio),
            "gamble split drifted to {ratio}"
        );
    }

    #[test]
    fn test_no_zone_draws_from_full_pool() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let skill = select_skill_with_rng(None, &mut rng);
            assert!(!skill.is_gamble_reserved());
        }
    }
}
