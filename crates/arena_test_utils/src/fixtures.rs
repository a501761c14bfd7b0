//! Test fixtures and helpers.
//!
//! Pre-built battles and combatants for consistent testing.

use arena_core::battle::Battle;
use arena_core::combatant::{Archetype, Combatant, EntityId};
use arena_core::config::BattleConfig;
use arena_core::grid::{CellType, GridCoord};
use arena_core::math::{milli, Fixed, Vec2Fixed};
use fixed::types::I32F32;

/// Tick length used by the fixtures: 50 ms.
pub const TICK_MS: i32 = 50;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Pixel position from integers.
#[must_use]
pub fn px(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// The fixtures' tick delta.
#[must_use]
pub fn tick_dt() -> Fixed {
    milli(TICK_MS)
}

/// Default config with a seed.
#[must_use]
pub fn seeded_config(seed: u64) -> BattleConfig {
    BattleConfig {
        seed,
        ..BattleConfig::default()
    }
}

/// Level-1 combatant at a pixel position.
#[must_use]
pub fn combatant(id: EntityId, archetype: Archetype, x: i32, y: i32) -> Combatant {
    let curve = BattleConfig::default().stat_curve;
    Combatant::new(id, format!("{archetype:?}-{id}"), archetype, 1, &curve).at(px(x, y))
}

/// Place a list of combatants, panicking on a bad layout.
///
/// # Panics
///
/// Panics if any combatant cannot be placed.
pub fn populate(battle: &mut Battle, combatants: Vec<Combatant>) {
    for c in combatants {
        let id = c.id;
        if let Err(err) = battle.add_combatant(c) {
            panic!("fixture combatant {id} could not be placed: {err}");
        }
    }
}

/// One party member against one enemy, both idle.
#[must_use]
pub fn duel(seed: u64, hero: Archetype, foe: Archetype, gap_px: i32) -> Battle {
    let mut battle = Battle::new(seeded_config(seed));
    populate(
        &mut battle,
        vec![combatant(1, hero, 100, 300), combatant(2, foe, 100 + gap_px, 300)],
    );
    battle
}

/// Three heroes on the left, four enemies on the right, a short wall in
/// between. Party members run on autopilot so the battle resolves
/// without commands.
#[must_use]
pub fn skirmish(seed: u64) -> Battle {
    let config = BattleConfig {
        party_autopilot: true,
        ..seeded_config(seed)
    };
    let mut battle = Battle::new(config);
    for row in 6..9 {
        battle.set_terrain(GridCoord::new(row, 10), CellType::Obstacle);
    }
    battle.set_terrain(GridCoord::new(3, 9), CellType::Cover);

    populate(
        &mut battle,
        vec![
            combatant(1, Archetype::Warrior, 140, 260),
            combatant(2, Archetype::Archer, 60, 300),
            combatant(3, Archetype::Mage, 60, 220),
            combatant(10, Archetype::Goblin, 620, 220),
            combatant(11, Archetype::Orc, 660, 300),
            combatant(12, Archetype::Skeleton, 700, 380),
            combatant(13, Archetype::Zombie, 740, 260),
        ],
    );
    battle
}

/// Run `ticks` fixture ticks.
pub fn run_ticks(battle: &mut Battle, ticks: u32) {
    for _ in 0..ticks {
        battle.tick(tick_dt());
    }
}

/// Run until the battle ends or `max_ticks` pass. Returns ticks run.
pub fn run_to_end(battle: &mut Battle, max_ticks: u32) -> u32 {
    let mut ran = 0;
    while ran < max_ticks && battle.outcome().is_none() {
        battle.tick(tick_dt());
        ran += 1;
    }
    tracing::debug!(ticks = ran, outcome = ?battle.outcome(), "fixture battle stopped");
    ran
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skirmish_places_everyone() {
        let battle = skirmish(1);
        assert_eq!(battle.combatants().len(), 7);
        assert_eq!(battle.grid().entity_count(), 7);
        assert_eq!(battle.grid().cell_type(GridCoord::new(7, 10)), CellType::Obstacle);
    }

    #[test]
    fn test_duel_gap() {
        let battle = duel(0, Archetype::Warrior, Archetype::Goblin, 200);
        let a = battle.combatant(1).map(|c| c.position);
        let b = battle.combatant(2).map(|c| c.position);
        assert_eq!(a, Some(px(100, 300)));
        assert_eq!(b, Some(px(300, 300)));
    }
}
