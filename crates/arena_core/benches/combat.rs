//! Combat engine benchmarks for arena_core.
//!
//! Run with: `cargo bench -p arena_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use arena_core::battle::Battle;
use arena_core::combatant::{Archetype, Combatant};
use arena_core::config::BattleConfig;
use arena_core::grid::{CellType, CombatGrid, GridCoord};
use arena_core::math::{milli, Vec2Fixed};
use arena_core::pathfinding::find_path;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Arena with broken wall segments every few columns.
fn obstacle_field() -> CombatGrid {
    let mut grid = CombatGrid::new(800, 600, 40);
    for col in (3..18).step_by(3) {
        let gap = col % 15;
        for row in 0..15 {
            if row != gap && row != (gap + 7) % 15 {
                grid.set_cell_type(GridCoord::new(row, col), CellType::Obstacle);
            }
        }
    }
    grid
}

fn crowded_battle(seed: u64) -> Battle {
    let config = BattleConfig {
        seed,
        party_autopilot: true,
        ..BattleConfig::default()
    };
    let curve = config.stat_curve;
    let mut battle = Battle::new(config);
    let party = [Archetype::Warrior, Archetype::Archer, Archetype::Mage];
    let foes = [
        Archetype::Goblin,
        Archetype::Orc,
        Archetype::Skeleton,
        Archetype::Zombie,
        Archetype::Troll,
    ];

    let mut id = 0;
    for (i, &archetype) in party.iter().cycle().take(6).enumerate() {
        id += 1;
        let row = i32::try_from(i).unwrap_or(0) * 2 + 2;
        let c = Combatant::new(id, "hero", archetype, 2, &curve).at(Vec2Fixed::from_ints(60, row * 40 + 20));
        let _ = battle.add_combatant(c);
    }
    for (i, &archetype) in foes.iter().cycle().take(10).enumerate() {
        id += 1;
        let i = i32::try_from(i).unwrap_or(0);
        let c = Combatant::new(id, "foe", archetype, 2, &curve)
            .at(Vec2Fixed::from_ints(660 + (i % 2) * 80, (i + 2) * 40 + 20));
        let _ = battle.add_combatant(c);
    }
    battle
}

pub fn pathfinding_benchmark(c: &mut Criterion) {
    let grid = obstacle_field();
    let start = Vec2Fixed::from_ints(20, 20);
    let goal = Vec2Fixed::from_ints(780, 580);

    c.bench_function("astar_obstacle_field", |b| {
        b.iter(|| find_path(black_box(&grid), black_box(start), black_box(goal)))
    });
}

pub fn battle_tick_benchmark(c: &mut Criterion) {
    let dt = milli(16);

    c.bench_function("battle_100_ticks_16v", |b| {
        b.iter_batched(
            || crowded_battle(7),
            |mut battle| {
                for _ in 0..100 {
                    black_box(battle.tick(dt));
                }
                battle.state_hash()
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, pathfinding_benchmark, battle_tick_benchmark);
criterion_main!(benches);
