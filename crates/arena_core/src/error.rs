//! Error types for the combat engine.

use thiserror::Error;

use crate::combat::CombatState;
use crate::combatant::EntityId;
use crate::grid::GridCoord;

/// Result type alias using [`ArenaError`].
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Top-level error type for rejected commands and failed queries.
///
/// None of these are fatal to a running battle. Callers treat them as
/// "nothing happened this tick" and may retry on a later tick.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// No combatant with this id exists.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The combatant has no health left.
    #[error("Entity {0} is dead")]
    EntityDead(EntityId),

    /// The attack cooldown has not elapsed yet.
    #[error("Entity {0} is still on attack cooldown")]
    OnCooldown(EntityId),

    /// The combatant is in a state that cannot start a new action.
    #[error("Entity {entity} is busy ({state:?})")]
    Busy {
        /// The busy combatant.
        entity: EntityId,
        /// Its current combat state.
        state: CombatState,
    },

    /// The chosen target cannot be attacked by this combatant.
    #[error("Entity {target} is not a valid target for {attacker}")]
    NotSelectable {
        /// The would-be attacker.
        attacker: EntityId,
        /// The rejected target.
        target: EntityId,
    },

    /// A combatant cannot be placed on this cell.
    #[error("Cell {0} is not free")]
    CellOccupied(GridCoord),

    /// The start cell of a path query is not walkable.
    #[error("Path start {0} is blocked")]
    StartBlocked(GridCoord),

    /// No route exists between the two cells.
    #[error("No path from {from} to {to}")]
    NoPath {
        /// Start cell.
        from: GridCoord,
        /// Goal cell (after any re-targeting).
        to: GridCoord,
    },

    /// No free cell beside cover is within reach.
    #[error("No cover within reach of entity {0}")]
    NoCover(EntityId),

    /// The battle already has an outcome.
    #[error("Battle is already over")]
    BattleOver,

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid engine state or failed (de)serialization.
    #[error("Invalid battle state: {0}")]
    InvalidState(String),
}
