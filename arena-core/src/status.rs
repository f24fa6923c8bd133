//! Status-effect ticking at the start of an acting player's turn.

use crate::state::PlayerBattleState;

/// What the pre-turn tick did to the acting player.
#[derive(Debug, Clone, Default)]
pub struct StatusTick {
    /// Poison damage applied this tick (0 when not poisoned).
    pub poison_damage: i32,
    /// Whether the poison ran out and was cleared.
    pub poison_cleared: bool,
    /// Whether the tick dropped the actor to 0 HP.
    pub defeated: bool,
    pub log: Vec<String>,
}

/// Tick the acting player's statuses before their skill resolves.
///
/// Only poison ticks here; the MP-regen bonus is consumed inside the
/// post-resolution regeneration step. If poison drops the actor to 0 HP
/// the caller must end the match in the opponent's favor and skip the
/// skill step entirely.
pub fn tick_turn_start(name: &str, state: &mut PlayerBattleState) -> StatusTick {
    let mut tick = StatusTick::default();

    if let Some(mut poison) = state.poison {
        let dealt = state.take_damage(poison.damage_per_turn);
        tick.poison_damage = dealt;
        tick.log
            .push(format!("{name} takes {dealt} poison damage."));

        poison.turns_remaining = poison.turns_remaining.saturating_sub(1);
        if poison.turns_remaining == 0 {
            state.poison = None;
            tick.poison_cleared = true;
            tick.log.push(format!("The poison wears off {name}."));
        } else {
            state.poison = Some(poison);
        }

        if state.is_defeated() {
            tick.defeated = true;
            tick.log.push(format!("{name} succumbs to the poison!"));
        }
    }

    tick
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PoisonStatus;

    #[test]
    fn test_three_ticks_then_clear() {
        let mut state = PlayerBattleState::new(500);
        state.poison = Some(PoisonStatus {
            damage_per_turn: 10,
            turns_remaining: 3,
        });

        let t1 = tick_turn_start("Alice", &mut state);
        assert_eq!(t1.poison_damage, 10);
        assert!(!t1.poison_cleared);
        assert_eq!(state.hp, 490);

        let t2 = tick_turn_start("Alice", &mut state);
        assert_eq!(t2.poison_damage, 10);
        assert_eq!(state.hp, 480);

        let t3 = tick_turn_start("Alice", &mut state);
        assert_eq!(t3.poison_damage, 10);
        assert!(t3.poison_cleared);
        assert_eq!(state.hp, 470);
        assert!(state.poison.is_none());

        let t4 = tick_turn_start("Alice", &mut state);
        assert_eq!(t4.poison_damage, 0);
        assert!(t4.log.is_empty());
    }

    #[test]
    fn test_poison_can_defeat() {
        let mut state = PlayerBattleState::new(500);
        state.hp = 8;
        state.poison = Some(PoisonStatus {
            damage_per_turn: 10,
            turns_remaining: 2,
        });

        let tick = tick_turn_start("Bob", &mut state);
        assert_eq!(tick.poison_damage, 8);
        assert!(tick.defeated);
        assert_eq!(state.hp, 0);
    }

    #[test]
    fn test_no_poison_is_a_noop() {
        let mut state = PlayerBattleState::new(500);
        let tick = tick_turn_start("Alice", &mut state);
        assert_eq!(tick.poison_damage, 0);
        assert!(!tick.defeated);
        assert!(!tick.poison_cleared);
    }
}
