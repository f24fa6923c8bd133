//! Randomized rolls for the battle engine.
//!
//! Every roll takes an explicit `Rng` so tests can seed a `StdRng` and
//! replay outcomes; the host supplies `thread_rng` at its boundary.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Damage variance bounds: a resolved hit lands between 90% and 110%
/// of the skill's declared power.
pub const VARIANCE_LOW: f64 = 0.9;
pub const VARIANCE_HIGH: f64 = 1.1;

/// A resolved damage roll, kept around for logging and event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DamageRoll {
    /// The skill's declared power.
    pub power: i32,
    /// The variance multiplier drawn in `[0.9, 1.1)`.
    pub multiplier: f64,
    /// `floor(power * multiplier)`.
    pub total: i32,
}

impl fmt::Display for DamageRoll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{:.2} = {}", self.power, self.multiplier, self.total)
    }
}

/// Roll base damage for a skill power: `floor(power * uniform(0.9, 1.1))`.
pub fn damage_roll_with_rng<R: Rng>(power: i32, rng: &mut R) -> DamageRoll {
    let multiplier = rng.gen_range(VARIANCE_LOW..VARIANCE_HIGH);
    let total = (power as f64 * multiplier).floor() as i32;
    DamageRoll {
        power,
        multiplier,
        total,
    }
}

/// Independent probability check: true with probability `p`.
pub fn check<R: Rng>(p: f64, rng: &mut R) -> bool {
    rng.gen::<f64>() < p
}

/// Uniform pick over a slice. Returns `None` on an empty pool; the
/// selector never passes one, but the fallback stays explicit.
pub fn pick<'a, T, R: Rng>(pool: &'a [T], rng: &mut R) -> Option<&'a T> {
    if pool.is_empty() {
        return None;
    }
    let index = rng.gen_range(0..pool.len());
    Some(&pool[index])
}

/// Roll a zone duration: uniform in 1..=3 turns.
pub fn zone_duration_with_rng<R: Rng>(rng: &mut R) -> u8 {
    rng.gen_range(1..=3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_damage_roll_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for power in [10, 30, 55, 150] {
            for _ in 0..200 {
                let roll = damage_roll_with_rng(power, &mut rng);
                let low = (power as f64 * VARIANCE_LOW).floor() as i32;
                let high = (power as f64 * VARIANCE_HIGH).floor() as i32;
                assert!(
                    roll.total >= low && roll.total <= high,
                    "roll {} out of [{}, {}] for power {}",
                    roll.total,
                    low,
                    high,
                    power
                );
            }
        }
    }

    #[test]
    fn test_check_extremes() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            assert!(check(1.0, &mut rng));
            assert!(!check(0.0, &mut rng));
        }
    }

    #[test]
    fn test_pick_covers_pool() {
        let mut rng = StdRng::seed_from_u64(11);
        let pool = [1, 2, 3, 4];
        let mut seen = [false; 4];
        for _ in 0..200 {
            let v = *pick(&pool, &mut rng).unwrap();
            seen[v - 1] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert!(pick::<i32, _>(&[], &mut rng).is_none());
    }

    #[test]
    fn test_zone_duration_range() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let d = zone_duration_with_rng(&mut rng);
            assert!((1..=3).contains(&d));
        }
    }
}
