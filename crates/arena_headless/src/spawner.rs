//! Level-scaled enemy waves.
//!
//! A wave is rolled from the party's level: which archetypes appear,
//! their levels, and an optional dragon boss. Rolls use their own
//! generator derived from the run seed, so a scenario with a wave still
//! replays identically.

use arena_core::combatant::Archetype;
use arena_core::config::ArenaConfig;
use arena_core::math::{cos_deg, Fixed};
use arena_core::rng::BattleRng;
use serde::{Deserialize, Serialize};

use crate::scenario::UnitPlacement;

/// Mixed into the run seed for wave rolls.
const WAVE_SEED_SALT: u64 = 0x5741_5645_0000_0001;

/// Early game: mostly goblins.
const EARLY: &[(Archetype, u32)] = &[
    (Archetype::Goblin, 70),
    (Archetype::Orc, 25),
    (Archetype::Skeleton, 5),
];

/// Mid game: trolls join.
const MIDDLE: &[(Archetype, u32)] = &[
    (Archetype::Goblin, 40),
    (Archetype::Orc, 30),
    (Archetype::Skeleton, 20),
    (Archetype::Troll, 10),
];

/// Late game: the occasional dragon.
const LATE: &[(Archetype, u32)] = &[
    (Archetype::Goblin, 20),
    (Archetype::Orc, 30),
    (Archetype::Skeleton, 20),
    (Archetype::Troll, 20),
    (Archetype::Dragon, 10),
];

/// Gap between neighbours in the line, wedge and circle formations.
const FORMATION_SPACING_PX: i32 = 120;

fn default_count() -> u32 {
    3
}

/// How a wave is laid out on the enemy side of the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Formation {
    /// Columns along the right edge, every other cell.
    #[default]
    Columns,
    /// One vertical line facing the party.
    Line,
    /// A chevron with its tip towards the party.
    Wedge,
    /// A ring around a point.
    Circle,
}

/// A generated enemy wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveSpec {
    /// Level the wave is scaled to.
    pub party_level: u32,
    /// Regular enemies to roll.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Add a dragon two levels above the party.
    #[serde(default)]
    pub boss: bool,
    /// Layout.
    #[serde(default)]
    pub formation: Formation,
}

impl WaveSpec {
    /// `count` regular enemies for a party of `party_level`, no boss.
    #[must_use]
    pub const fn new(party_level: u32, count: u32) -> Self {
        Self {
            party_level,
            count,
            boss: false,
            formation: Formation::Columns,
        }
    }

    /// Add the boss.
    #[must_use]
    pub const fn with_boss(mut self) -> Self {
        self.boss = true;
        self
    }

    /// Use a formation.
    #[must_use]
    pub const fn in_formation(mut self, formation: Formation) -> Self {
        self.formation = formation;
        self
    }

    /// Inclusive level range regular enemies are drawn from.
    ///
    /// Spread is a fifth of the party level, at least one.
    #[must_use]
    pub fn level_range(&self) -> (u32, u32) {
        let level = self.party_level.max(1);
        let spread = (level / 5).max(1);
        (level.saturating_sub(spread).max(1), level + spread)
    }
}

/// Archetype weights (percent) for a party level.
#[must_use]
pub fn composition(party_level: u32) -> &'static [(Archetype, u32)] {
    match party_level {
        0..=3 => EARLY,
        4..=7 => MIDDLE,
        _ => LATE,
    }
}

fn pick(rng: &mut BattleRng, weights: &[(Archetype, u32)]) -> Archetype {
    let total: u32 = weights.iter().map(|&(_, w)| w).sum();
    let mut roll = rng.range_inclusive(0, total.saturating_sub(1));
    for &(archetype, weight) in weights {
        if roll < weight {
            return archetype;
        }
        roll -= weight;
    }
    weights.last().map_or(Archetype::Goblin, |&(a, _)| a)
}

/// Pixel position of the `index`-th of `total` wave slots, kept inside
/// the arena.
fn slot(formation: Formation, index: u32, total: u32, arena: &ArenaConfig) -> (i32, i32) {
    let cell = i32::try_from(arena.cell_size_px.max(1)).unwrap_or(i32::MAX);
    let width = i32::try_from(arena.width_px).unwrap_or(i32::MAX);
    let height = i32::try_from(arena.height_px).unwrap_or(i32::MAX);
    let index = i32::try_from(index).unwrap_or(i32::MAX);
    let total = i32::try_from(total.max(1)).unwrap_or(i32::MAX);
    let mid = height / 2;
    // Alternating offsets from the centre: 0, -1, +1, -2, +2, ...
    let rank = (index + 1) / 2;
    let side = if index % 2 == 1 { -1 } else { 1 };

    let (x, y) = match formation {
        Formation::Columns => {
            let per_column = (height / (2 * cell)).max(1);
            let column = index / per_column;
            let row = index % per_column;
            (
                width - cell - cell / 2 - column * 2 * cell,
                cell + cell / 2 + row * 2 * cell,
            )
        }
        Formation::Line => (width - 3 * cell, mid + side * rank * FORMATION_SPACING_PX),
        Formation::Wedge => (
            width / 2 + 2 * cell + rank * FORMATION_SPACING_PX * 7 / 10,
            mid + side * rank * FORMATION_SPACING_PX * 7 / 10,
        ),
        Formation::Circle => {
            let centre_x = width - 4 * cell;
            let degrees = 360 * index / total;
            let radius = Fixed::from_num(FORMATION_SPACING_PX);
            let dx = (radius * cos_deg(degrees)).round().to_num::<i32>();
            let dy = (radius * cos_deg(90 - degrees)).round().to_num::<i32>();
            (centre_x + dx, mid + dy)
        }
    };
    let low = cell / 2;
    (x.clamp(low, (width - low).max(low)), y.clamp(low, (height - low).max(low)))
}

/// Roll a wave for the run `seed`.
///
/// Slots may overlap terrain; the scenario builder moves such units to
/// the nearest free cell.
#[must_use]
pub fn generate(spec: &WaveSpec, arena: &ArenaConfig, seed: u64) -> Vec<UnitPlacement> {
    let mut rng = BattleRng::new(seed ^ WAVE_SEED_SALT);
    let weights = composition(spec.party_level);
    let (low, high) = spec.level_range();

    let total = spec.count + u32::from(spec.boss);
    let mut units: Vec<UnitPlacement> = (0..spec.count)
        .map(|i| {
            let archetype = pick(&mut rng, weights);
            let level = rng.range_inclusive(low, high);
            let (x, y) = slot(spec.formation, i, total, arena);
            UnitPlacement::new(archetype, x, y).at_level(level)
        })
        .collect();

    if spec.boss {
        let (x, y) = slot(spec.formation, spec.count, total, arena);
        let mut boss = UnitPlacement::new(Archetype::Dragon, x, y)
            .at_level(spec.party_level.max(1) + 2);
        boss.name = Some("Dragon Boss".to_string());
        boss.interruptible = false;
        units.push(boss);
    }

    tracing::debug!(
        party_level = spec.party_level,
        count = units.len(),
        boss = spec.boss,
        formation = ?spec.formation,
        "wave rolled"
    );
    units
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_range() {
        assert_eq!(WaveSpec::new(1, 3).level_range(), (1, 2));
        assert_eq!(WaveSpec::new(4, 3).level_range(), (3, 5));
        assert_eq!(WaveSpec::new(10, 3).level_range(), (8, 12));
        assert_eq!(WaveSpec::new(0, 3).level_range(), (1, 2));
    }

    #[test]
    fn test_composition_by_level() {
        for level in [1, 5, 9] {
            let total: u32 = composition(level).iter().map(|&(_, w)| w).sum();
            assert_eq!(total, 100);
        }
        assert!(!composition(3).iter().any(|&(a, _)| a == Archetype::Troll));
        assert!(composition(7).iter().any(|&(a, _)| a == Archetype::Troll));
        assert!(composition(8).iter().any(|&(a, _)| a == Archetype::Dragon));
    }

    #[test]
    fn test_wave_respects_table_and_levels() {
        let spec = WaveSpec::new(2, 40);
        let wave = generate(&spec, &ArenaConfig::default(), 9);
        assert_eq!(wave.len(), 40);
        let allowed: Vec<Archetype> = composition(2).iter().map(|&(a, _)| a).collect();
        let (low, high) = spec.level_range();
        for unit in &wave {
            assert!(allowed.contains(&unit.archetype));
            assert!((low..=high).contains(&unit.level));
        }
        // Goblins dominate early waves.
        let goblins = wave.iter().filter(|u| u.archetype == Archetype::Goblin).count();
        assert!(goblins > 10);
    }

    #[test]
    fn test_boss_is_a_dragon_above_the_party() {
        let wave = generate(&WaveSpec::new(5, 2).with_boss(), &ArenaConfig::default(), 1);
        assert_eq!(wave.len(), 3);
        let boss = &wave[2];
        assert_eq!(boss.archetype, Archetype::Dragon);
        assert_eq!(boss.level, 7);
        assert!(!boss.interruptible);
    }

    #[test]
    fn test_same_seed_same_wave() {
        let spec = WaveSpec::new(6, 8);
        let arena = ArenaConfig::default();
        assert_eq!(generate(&spec, &arena, 77), generate(&spec, &arena, 77));
    }

    fn slots(formation: Formation, total: u32) -> Vec<(i32, i32)> {
        (0..total)
            .map(|i| slot(formation, i, total, &ArenaConfig::default()))
            .collect()
    }

    #[test]
    fn test_column_slots() {
        let columns = slots(Formation::Columns, 14);
        assert_eq!(columns[0], (740, 60));
        assert_eq!(columns[1], (740, 140));
        assert_eq!(columns[7], (660, 60));
    }

    #[test]
    fn test_formation_shapes() {
        let line = slots(Formation::Line, 5);
        assert!(line.iter().all(|&(x, _)| x == 680));
        assert_eq!(line[0], (680, 300));
        assert_eq!(line[1], (680, 180));
        assert_eq!(line[2], (680, 420));

        let wedge = slots(Formation::Wedge, 5);
        // The tip is nearest the party; the wings trail behind it.
        assert!(wedge[1..].iter().all(|&(x, _)| x > wedge[0].0));
        assert_eq!(wedge[1].0, wedge[2].0);

        let circle = slots(Formation::Circle, 4);
        assert_eq!(circle[0], (760, 300));
        assert_eq!(circle[1], (640, 420));
        assert_eq!(circle[2], (520, 300));
    }

    #[test]
    fn test_slots_stay_inside_and_apart() {
        for formation in [
            Formation::Columns,
            Formation::Line,
            Formation::Wedge,
            Formation::Circle,
        ] {
            let all = slots(formation, 6);
            for (i, a) in all.iter().enumerate() {
                assert!(a.0 > 0 && a.0 < 800 && a.1 > 0 && a.1 < 600, "{formation:?}");
                assert!(!all[i + 1..].contains(a), "{formation:?}");
            }
        }
    }

    #[test]
    fn test_formation_from_ron() {
        let spec: WaveSpec =
            ron::from_str("(party_level: 2, formation: Wedge)").expect("RON");
        assert_eq!(spec, WaveSpec::new(2, 3).in_formation(Formation::Wedge));
    }
}
