//! Scenario loading and battle construction.
//!
//! Scenarios define the arena, terrain and both rosters for a headless
//! battle. They are RON files; every field has a default, so a scenario
//! only needs to spell out what differs.

use std::path::Path;

use arena_core::battle::Battle;
use arena_core::combatant::{Archetype, Combatant, EntityId, Faction};
use arena_core::config::BattleConfig;
use arena_core::error::ArenaError;
use arena_core::grid::{CellType, GridCoord};
use arena_core::math::{milli, Fixed, Vec2Fixed};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spawner::{generate, WaveSpec};

/// First id handed to enemies; party members count up from 1.
pub const ENEMY_ID_BASE: EntityId = 100;

/// How far, in cells, a wave unit may be moved off a blocked slot.
const WAVE_PLACEMENT_RADIUS: i32 = 3;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Failed to write RON.
    #[error("Failed to serialize scenario: {0}")]
    SerializeError(#[from] ron::Error),
    /// A unit is listed on the wrong side.
    #[error("{archetype:?} cannot fight for the {side:?}")]
    WrongSide {
        /// Offending archetype.
        archetype: Archetype,
        /// List it was placed in.
        side: Faction,
    },
    /// A terrain cell could not be set.
    #[error("Cannot place {cell:?} terrain at row {row}, col {col}")]
    Terrain {
        /// Row.
        row: i32,
        /// Column.
        col: i32,
        /// Requested type.
        cell: CellType,
    },
    /// The battle configuration does not validate.
    #[error("Invalid scenario configuration: {0}")]
    Config(ArenaError),
    /// A unit could not be placed.
    #[error("Cannot place unit: {0}")]
    Placement(#[from] ArenaError),
}

/// Static terrain on one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainPlacement {
    /// Row.
    pub row: i32,
    /// Column.
    pub col: i32,
    /// Obstacle, Hazard or Cover.
    pub cell: CellType,
}

impl TerrainPlacement {
    /// Create a terrain placement.
    #[must_use]
    pub const fn new(row: i32, col: i32, cell: CellType) -> Self {
        Self { row, col, cell }
    }
}

fn default_level() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

/// One combatant in a roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Class.
    pub archetype: Archetype,
    /// Starting level.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Pixel x.
    pub x: i32,
    /// Pixel y.
    pub y: i32,
    /// Display name; defaults to the archetype.
    #[serde(default)]
    pub name: Option<String>,
    /// Heavy hits may break wind-ups.
    #[serde(default = "default_true")]
    pub interruptible: bool,
}

impl UnitPlacement {
    /// Level-1 unit at a pixel position.
    #[must_use]
    pub fn new(archetype: Archetype, x: i32, y: i32) -> Self {
        Self {
            archetype,
            level: 1,
            x,
            y,
            name: None,
            interruptible: true,
        }
    }

    /// Set the level.
    #[must_use]
    pub fn at_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }
}

/// A complete scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Battle configuration. The seed is overridden per run.
    pub config: BattleConfig,
    /// Static terrain.
    pub terrain: Vec<TerrainPlacement>,
    /// Party roster.
    pub party: Vec<UnitPlacement>,
    /// Enemy roster.
    pub enemies: Vec<UnitPlacement>,
    /// Extra enemies rolled per seed, placed after `enemies`.
    pub wave: Option<WaveSpec>,
    /// Give up after this many ticks (timeout).
    pub max_ticks: u64,
    /// Tick length in milliseconds.
    pub tick_ms: u32,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Untitled".to_string(),
            description: String::new(),
            config: BattleConfig::default(),
            terrain: Vec::new(),
            party: Vec::new(),
            enemies: Vec::new(),
            wave: None,
            max_ticks: 6000,
            tick_ms: 50,
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Pretty RON text for this scenario.
    pub fn to_ron_string(&self) -> Result<String, ScenarioError> {
        let pretty = ron::ser::PrettyConfig::new().struct_names(false);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Three heroes against four enemies across a broken wall.
    #[must_use]
    pub fn skirmish() -> Self {
        Self {
            name: "Skirmish".to_string(),
            description: "Warrior, archer and mage against a mixed warband".to_string(),
            config: BattleConfig {
                party_autopilot: true,
                ..BattleConfig::default()
            },
            terrain: vec![
                TerrainPlacement::new(6, 10, CellType::Obstacle),
                TerrainPlacement::new(7, 10, CellType::Obstacle),
                TerrainPlacement::new(8, 10, CellType::Obstacle),
                TerrainPlacement::new(3, 9, CellType::Cover),
                TerrainPlacement::new(11, 9, CellType::Cover),
                TerrainPlacement::new(12, 12, CellType::Hazard),
            ],
            party: vec![
                UnitPlacement::new(Archetype::Warrior, 140, 260),
                UnitPlacement::new(Archetype::Archer, 60, 300),
                UnitPlacement::new(Archetype::Mage, 60, 220),
            ],
            enemies: vec![
                UnitPlacement::new(Archetype::Goblin, 620, 220),
                UnitPlacement::new(Archetype::Orc, 660, 300),
                UnitPlacement::new(Archetype::Skeleton, 700, 380),
                UnitPlacement::new(Archetype::Zombie, 740, 260),
            ],
            ..Self::default()
        }
    }

    /// Tick length as simulation seconds.
    #[must_use]
    pub fn tick_dt(&self) -> Fixed {
        milli(i32::try_from(self.tick_ms.max(1)).unwrap_or(i32::MAX))
    }

    /// Build a ready-to-run battle with the given seed.
    ///
    /// Party members get ids from 1, enemies from [`ENEMY_ID_BASE`].
    /// Wave enemies follow the listed ones and are moved to the nearest
    /// free cell when their slot is taken.
    pub fn build(&self, seed: u64) -> Result<Battle, ScenarioError> {
        let config = BattleConfig {
            seed,
            ..self.config.clone()
        };
        let curve = config.stat_curve;
        let mut battle = Battle::try_new(config).map_err(ScenarioError::Config)?;

        for t in &self.terrain {
            if !battle.set_terrain(GridCoord::new(t.row, t.col), t.cell) {
                return Err(ScenarioError::Terrain {
                    row: t.row,
                    col: t.col,
                    cell: t.cell,
                });
            }
        }

        let sides = [
            (Faction::Party, 1, &self.party),
            (Faction::Enemies, ENEMY_ID_BASE, &self.enemies),
        ];
        for (side, first_id, units) in sides {
            for (id, unit) in (first_id..).zip(units.iter()) {
                if unit.archetype.faction() != side {
                    return Err(ScenarioError::WrongSide {
                        archetype: unit.archetype,
                        side,
                    });
                }
                let name = unit
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("{:?} {id}", unit.archetype));
                let mut combatant = Combatant::new(id, name, unit.archetype, unit.level, &curve)
                    .at(Vec2Fixed::from_ints(unit.x, unit.y));
                combatant.can_be_interrupted = unit.interruptible;
                battle.add_combatant(combatant)?;
            }
        }

        if let Some(spec) = &self.wave {
            let listed = EntityId::try_from(self.enemies.len()).unwrap_or_default();
            let first_id = ENEMY_ID_BASE + listed;
            for (id, unit) in (first_id..).zip(generate(spec, &self.config.arena, seed)) {
                let slot = Vec2Fixed::from_ints(unit.x, unit.y);
                let position = battle
                    .grid()
                    .nearest_free_position(slot, WAVE_PLACEMENT_RADIUS)
                    .ok_or_else(|| ArenaError::CellOccupied(battle.grid().cell_coords(slot)))?;
                let name = unit
                    .name
                    .unwrap_or_else(|| format!("{:?} {id}", unit.archetype));
                let mut combatant =
                    Combatant::new(id, name, unit.archetype, unit.level, &curve).at(position);
                combatant.can_be_interrupted = unit.interruptible;
                battle.add_combatant(combatant)?;
            }
        }

        tracing::debug!(
            scenario = %self.name,
            seed,
            party = self.party.len(),
            enemies = self.enemies.len(),
            "scenario built"
        );
        Ok(battle)
    }
}
