//! # Arena Core
//!
//! Deterministic real-time tactical combat engine.
//!
//! This crate contains **only** simulation logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! The same configuration, roster, seed and sequence of tick deltas
//! always produce the same battle, which makes headless batch runs and
//! determinism tests possible.
//!
//! ## Crate Structure
//!
//! - [`grid`] - Cell occupancy, terrain, cover and line of sight
//! - [`pathfinding`] - A* over the grid
//! - [`movement`] - Path following with occupancy updates
//! - [`scheduler`] - Time-ordered deferred events
//! - [`combat`] - Per-combatant combat state machine
//! - [`combatant`] - Archetypes, stats and abilities
//! - [`modifiers`] - Flanking and directional cover
//! - [`area`] - Area effect shapes and templates
//! - [`tactics`] - Position scoring and target selection
//! - [`battle`] - The battle manager tying it all together
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod area;
pub mod battle;
pub mod combat;
pub mod combatant;
pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod math;
pub mod modifiers;
pub mod movement;
pub mod pathfinding;
pub mod rng;
pub mod roster;
pub mod scheduler;
pub mod snapshot;
pub mod tactics;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::area::{AreaEffect, AreaShape};
    pub use crate::battle::{Battle, Outcome};
    pub use crate::combat::{CombatState, CombatStateMachine};
    pub use crate::combatant::{Archetype, Combatant, EntityId, Faction, HitKind};
    pub use crate::config::{AiConfig, ArenaConfig, BattleConfig, StatCurve, TacticalWeights};
    pub use crate::error::{ArenaError, Result};
    pub use crate::events::{BattleEvent, Control, EventRecord, Topic};
    pub use crate::grid::{CellType, CombatGrid, GridCoord};
    pub use crate::math::{milli, Fixed, Vec2Fixed};
    pub use crate::modifiers::{CoverLevel, StrikeModifiers};
    pub use crate::snapshot::{MemberSnapshot, PartySnapshot};
}
