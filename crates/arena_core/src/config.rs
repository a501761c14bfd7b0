//! Battle configuration.
//!
//! Everything here is plain integers (pixels, milliseconds, percentages)
//! so configuration files never carry floats. Values are converted to
//! [`Fixed`] at the point of use.
//!
//! # Example RON
//!
//! ```ron
//! BattleConfig(
//!     arena: ArenaConfig(width_px: 800, height_px: 600, cell_size_px: 40),
//!     ai: AiConfig(decision_interval_ms: 500, hysteresis_pct: 50),
//!     seed: 7,
//! )
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ArenaError;
use crate::math::{milli, percent, Fixed};

/// Largest arena side in pixels.
pub const MAX_ARENA_PX: u32 = 16_384;
/// Most cells along one side of the grid.
pub const MAX_GRID_SIDE: u32 = 1024;

/// Arena dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Arena width in pixels.
    pub width_px: u32,
    /// Arena height in pixels.
    pub height_px: u32,
    /// Side of one grid cell in pixels.
    pub cell_size_px: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            width_px: 800,
            height_px: 600,
            cell_size_px: 40,
        }
    }
}

impl ArenaConfig {
    /// Reject dimensions the grid cannot be built from.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] for a zero or oversized side, a zero
    /// cell size, or more than [`MAX_GRID_SIDE`] cells along a side.
    pub fn validate(&self) -> Result<(), ArenaError> {
        for (field, value) in [("width_px", self.width_px), ("height_px", self.height_px)] {
            if value == 0 || value > MAX_ARENA_PX {
                return Err(ArenaError::InvalidConfig(format!(
                    "arena {field} must be in 1..={MAX_ARENA_PX}, got {value}"
                )));
            }
        }
        if self.cell_size_px == 0 {
            return Err(ArenaError::InvalidConfig(
                "arena cell_size_px must be positive".to_string(),
            ));
        }
        let side = self.width_px.max(self.height_px).div_ceil(self.cell_size_px);
        if side > MAX_GRID_SIDE {
            return Err(ArenaError::InvalidConfig(format!(
                "arena needs {side} cells along one side, at most {MAX_GRID_SIDE} allowed"
            )));
        }
        Ok(())
    }

    /// The nearest dimensions that pass [`Self::validate`].
    #[must_use]
    pub fn clamped(&self) -> Self {
        let width_px = self.width_px.clamp(1, MAX_ARENA_PX);
        let height_px = self.height_px.clamp(1, MAX_ARENA_PX);
        let min_cell = width_px.max(height_px).div_ceil(MAX_GRID_SIDE);
        Self {
            width_px,
            height_px,
            cell_size_px: self.cell_size_px.max(min_cell).max(1),
        }
    }
}

/// Relative weight of each factor in position scoring, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticalWeights {
    /// Closeness to the preferred engagement distance.
    pub distance_pct: i32,
    /// Angular separation from allies engaging the same target.
    pub flanking_pct: i32,
    /// Spacing from the nearest ally.
    pub ally_pct: i32,
    /// Cover cells around the candidate.
    pub cover_pct: i32,
    /// Clear sight line to the target.
    pub line_of_sight_pct: i32,
}

impl Default for TacticalWeights {
    fn default() -> Self {
        Self {
            distance_pct: 200,
            flanking_pct: 150,
            ally_pct: 80,
            cover_pct: 120,
            line_of_sight_pct: 100,
        }
    }
}

/// Tactical AI cadence and sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// How often the AI pass runs.
    pub decision_interval_ms: u32,
    /// Minimum time between position reassessments of one combatant.
    pub reassess_interval_ms: u32,
    /// Directions sampled on each ring (at most 12 are used).
    pub sample_count: u32,
    /// Radius of the outermost ring sampled around the combatant.
    pub sample_radius_px: u32,
    /// Score margin a new position must win by.
    pub hysteresis_pct: i32,
    /// Spacing from the nearest ally that scores best.
    pub ideal_ally_spacing_px: u32,
    /// Scoring weights.
    pub weights: TacticalWeights,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            decision_interval_ms: 500,
            reassess_interval_ms: 2000,
            sample_count: 12,
            sample_radius_px: 200,
            hysteresis_pct: 50,
            ideal_ally_spacing_px: 120,
            weights: TacticalWeights::default(),
        }
    }
}

impl AiConfig {
    /// AI pass interval in seconds.
    #[must_use]
    pub fn decision_interval(&self) -> Fixed {
        milli(to_i32(self.decision_interval_ms))
    }

    /// Reassessment interval in seconds.
    #[must_use]
    pub fn reassess_interval(&self) -> Fixed {
        milli(to_i32(self.reassess_interval_ms))
    }

    /// Hysteresis margin as a score delta.
    #[must_use]
    pub fn hysteresis(&self) -> Fixed {
        percent(self.hysteresis_pct)
    }
}

/// Stat and progression constants handed to combatant construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatCurve {
    /// Level-1 health before archetype multipliers.
    pub base_hp: i32,
    /// Level-1 attack.
    pub base_attack: i32,
    /// Level-1 defense.
    pub base_defense: i32,
    /// Level-1 magic.
    pub base_magic: i32,
    /// Level-1 speed.
    pub base_speed: i32,
    /// Per-level growth of health, attack, defense and magic.
    pub growth_pct: i32,
    /// Per-level growth of speed.
    pub speed_growth_pct: i32,
    /// Attack cooldown before speed reduction.
    pub cooldown_base_ms: u32,
    /// Coefficient of the `c · (level + 1)^1.5` experience curve.
    pub xp_curve_base: u32,
    /// Share of a defeated enemy's experience split across the party.
    pub shared_xp_pct: u32,
    /// Share awarded on top to whoever landed the killing blow.
    pub killer_bonus_pct: u32,
}

impl Default for StatCurve {
    fn default() -> Self {
        Self {
            base_hp: 100,
            base_attack: 10,
            base_defense: 5,
            base_magic: 10,
            base_speed: 5,
            growth_pct: 10,
            speed_growth_pct: 5,
            cooldown_base_ms: 1000,
            xp_curve_base: 100,
            shared_xp_pct: 70,
            killer_bonus_pct: 30,
        }
    }
}

impl StatCurve {
    /// Base attack cooldown in seconds.
    #[must_use]
    pub fn cooldown_base(&self) -> Fixed {
        milli(to_i32(self.cooldown_base_ms))
    }
}

/// Top-level configuration of one battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Arena size.
    pub arena: ArenaConfig,
    /// Tactical AI settings.
    pub ai: AiConfig,
    /// Pursuit re-check interval for player-ordered attacks.
    pub range_check_interval_ms: u32,
    /// Waypoint simplification tolerance.
    pub path_tolerance_px: u32,
    /// Let the AI drive the party as well (headless runs).
    pub party_autopilot: bool,
    /// RNG seed.
    pub seed: u64,
    /// Stat constants.
    pub stat_curve: StatCurve,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            arena: ArenaConfig::default(),
            ai: AiConfig::default(),
            range_check_interval_ms: 100,
            path_tolerance_px: 10,
            party_autopilot: false,
            seed: 0,
            stat_curve: StatCurve::default(),
        }
    }
}

impl BattleConfig {
    /// Parse a configuration from RON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns the RON parse error with its source span.
    pub fn from_ron_str(ron: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(ron)
    }

    /// Check every value a battle depends on.
    ///
    /// # Errors
    ///
    /// [`ArenaError::InvalidConfig`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ArenaError> {
        self.arena.validate()?;
        if self.ai.decision_interval_ms == 0 {
            return Err(ArenaError::InvalidConfig(
                "ai decision_interval_ms must be positive".to_string(),
            ));
        }
        if self.range_check_interval_ms == 0 {
            return Err(ArenaError::InvalidConfig(
                "range_check_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Range-check interval in seconds, at least one millisecond.
    #[must_use]
    pub fn range_check_interval(&self) -> Fixed {
        milli(to_i32(self.range_check_interval_ms.max(1)))
    }

    /// Path tolerance in pixels.
    #[must_use]
    pub fn path_tolerance(&self) -> Fixed {
        Fixed::from_num(self.path_tolerance_px)
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BattleConfig::default();
        assert_eq!(config.arena.cell_size_px, 40);
        assert_eq!(config.ai.decision_interval(), Fixed::from_num(1) / Fixed::from_num(2));
        assert_eq!(config.ai.reassess_interval(), Fixed::from_num(2));
        assert_eq!(config.stat_curve.cooldown_base(), Fixed::ONE);
        assert_eq!(config.path_tolerance(), Fixed::from_num(10));
    }

    #[test]
    fn test_partial_ron_fills_defaults() {
        let config = BattleConfig::from_ron_str(
            "(arena: (width_px: 400, height_px: 200), seed: 9, ai: (hysteresis_pct: 25))",
        )
        .expect("valid RON");
        assert_eq!(config.arena.width_px, 400);
        assert_eq!(config.arena.cell_size_px, 40);
        assert_eq!(config.seed, 9);
        assert_eq!(config.ai.hysteresis_pct, 25);
        assert_eq!(config.ai.sample_count, 12);
        assert_eq!(config.stat_curve, StatCurve::default());
    }

    #[test]
    fn test_bad_ron_is_error() {
        assert!(BattleConfig::from_ron_str("(arena: 12)").is_err());
    }

    #[test]
    fn test_zero_cell_size_is_rejected() {
        let config =
            BattleConfig::from_ron_str("(arena:(width_px:800,height_px:600,cell_size_px:0))")
                .expect("valid RON");
        assert!(matches!(config.validate(), Err(ArenaError::InvalidConfig(_))));
        assert_eq!(config.arena.clamped().cell_size_px, 1);
        assert!(config.arena.clamped().validate().is_ok());
    }

    #[test]
    fn test_oversized_arena_is_rejected_and_clamped() {
        let arena = ArenaConfig {
            width_px: u32::MAX,
            height_px: 0,
            cell_size_px: 1,
        };
        assert!(arena.validate().is_err());
        let clamped = arena.clamped();
        assert_eq!(clamped.width_px, MAX_ARENA_PX);
        assert_eq!(clamped.height_px, 1);
        assert_eq!(clamped.cell_size_px, 16);
        assert!(clamped.validate().is_ok());
        assert!(BattleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut config = BattleConfig::default();
        config.ai.decision_interval_ms = 0;
        assert!(config.validate().is_err());
        config.ai.decision_interval_ms = 500;
        config.range_check_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ron_round_trip() {
        let config = BattleConfig {
            party_autopilot: true,
            ..BattleConfig::default()
        };
        let text = ron::to_string(&config).expect("serialize");
        assert_eq!(BattleConfig::from_ron_str(&text).expect("parse"), config);
    }
}
