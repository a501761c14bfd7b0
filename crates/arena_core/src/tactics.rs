//! Tactical AI: target selection, position scoring and per-pass decisions.
//!
//! Positions are scored as a weighted sum of five factors, each in
//! `[0, 1]`. Role profiles scale the preferred engagement distance and
//! the factor weights per archetype.

use serde::{Deserialize, Serialize};

use crate::combat::CombatState;
use crate::combatant::{Combatant, EntityId, TargetPreference};
use crate::config::AiConfig;
use crate::grid::{CellType, CombatGrid};
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::rng::BattleRng;
use crate::roster::Roster;

/// Score of a candidate the combatant cannot stand on.
pub const INVALID_SCORE: i32 = -1000;

/// Unit vectors at 30° steps, in thousandths.
const SAMPLE_DIRECTIONS: [(i32, i32); 12] = [
    (1000, 0),
    (866, 500),
    (500, 866),
    (0, 1000),
    (-500, 866),
    (-866, 500),
    (-1000, 0),
    (-866, -500),
    (-500, -866),
    (0, -1000),
    (500, -866),
    (866, -500),
];

/// Rings sampled around the combatant, as thousandths of the sample radius.
const SELF_RINGS: [i32; 3] = [400, 700, 1000];

/// Fraction of attack range an approach aims for.
const APPROACH_RANGE_PCT: i32 = 80;

/// Flanking factor above which a reposition counts as flanking.
const FLANK_STANCE_PCT: i32 = 50;

/// Positioning style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TacticalProfile {
    /// Close in and flank.
    Aggressive,
    /// Keep some distance, value cover.
    #[default]
    Cautious,
    /// Stay at range with a clear shot.
    Ranged,
    /// Flank, ignore allies.
    Mobile,
    /// Hold near cover and allies.
    Defensive,
}

/// Multipliers of a profile, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileParams {
    /// Preferred distance as a multiple of attack range.
    pub preferred_distance_pct: i32,
    /// Flanking weight multiplier.
    pub flanking_pct: i32,
    /// Cover weight multiplier.
    pub cover_pct: i32,
    /// Ally spacing weight multiplier.
    pub ally_pct: i32,
    /// Line-of-sight weight multiplier.
    pub line_of_sight_pct: i32,
}

impl TacticalProfile {
    /// Multipliers for this profile.
    #[must_use]
    pub const fn params(self) -> ProfileParams {
        let (preferred, flanking, cover, ally, los) = match self {
            Self::Aggressive => (80, 180, 50, 70, 50),
            Self::Cautious => (120, 100, 150, 120, 100),
            Self::Ranged => (150, 80, 180, 90, 150),
            Self::Mobile => (100, 150, 70, 50, 80),
            Self::Defensive => (110, 60, 200, 150, 100),
        };
        ProfileParams {
            preferred_distance_pct: preferred,
            flanking_pct: flanking,
            cover_pct: cover,
            ally_pct: ally,
            line_of_sight_pct: los,
        }
    }
}

/// Per-factor scores of one candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScoreBreakdown {
    /// Closeness to the preferred distance.
    pub distance: Fixed,
    /// Angular offset from engaging allies.
    pub flanking: Fixed,
    /// Closeness of the nearest ally to the ideal spacing.
    pub ally: Fixed,
    /// Share of neighbouring cells giving cover.
    pub cover: Fixed,
    /// 1 with a clear line to the target.
    pub line_of_sight: Fixed,
    /// Weighted sum, or [`INVALID_SCORE`].
    pub total: Fixed,
}

impl ScoreBreakdown {
    fn invalid() -> Self {
        Self {
            total: Fixed::from_num(INVALID_SCORE),
            ..Self::default()
        }
    }

    /// Movement state that fits a reposition to this spot.
    #[must_use]
    pub fn stance(&self) -> CombatState {
        if self.flanking >= percent(FLANK_STANCE_PCT) {
            CombatState::Flanking
        } else if self.cover > Fixed::ZERO {
            CombatState::TakingCover
        } else {
            CombatState::Moving
        }
    }
}

/// What a combatant should do this AI pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Start an attack now.
    Attack(EntityId),
    /// Reposition.
    MoveTo {
        /// Destination pixel.
        position: Vec2Fixed,
        /// Movement state to use.
        stance: CombatState,
    },
    /// Path into range of the target.
    Approach(EntityId),
    /// Do nothing.
    Hold,
}

/// Outcome of one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Target the combatant is now focused on.
    pub target: Option<EntityId>,
    /// Action to take.
    pub intent: Intent,
    /// True if a position reassessment ran.
    pub reassessed: bool,
}

impl Decision {
    const fn hold(target: Option<EntityId>) -> Self {
        Self {
            target,
            intent: Intent::Hold,
            reassessed: false,
        }
    }
}

/// Read-only battle view handed to the AI.
#[derive(Debug, Clone, Copy)]
pub struct AiContext<'a> {
    /// Occupancy and terrain.
    pub grid: &'a CombatGrid,
    /// All combatants.
    pub roster: &'a Roster,
    /// Current simulation time.
    pub now: Fixed,
    /// Pick nearest targets regardless of archetype.
    pub autopilot: bool,
}

/// Scores positions and picks actions.
#[derive(Debug, Clone)]
pub struct TacticalAi {
    config: AiConfig,
}

impl TacticalAi {
    /// AI with the given tuning.
    #[must_use]
    pub const fn new(config: AiConfig) -> Self {
        Self { config }
    }

    /// Tuning in use.
    #[must_use]
    pub const fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Preferred engagement distance of a combatant.
    #[must_use]
    pub fn preferred_distance(entity: &Combatant) -> Fixed {
        let params = entity.archetype.profile().params();
        entity.attack_range() * percent(params.preferred_distance_pct)
    }

    /// Score standing at `candidate` while fighting `target`.
    #[must_use]
    pub fn evaluate_position(
        &self,
        grid: &CombatGrid,
        roster: &Roster,
        entity: &Combatant,
        candidate: Vec2Fixed,
        target: &Combatant,
    ) -> ScoreBreakdown {
        if !grid.contains_pixel(candidate) {
            return ScoreBreakdown::invalid();
        }
        let cell = grid.cell_coords(candidate);
        let own_cell = grid.cell_of(entity.id) == Some(cell);
        if !own_cell && grid.cell_type(cell) != CellType::Empty {
            return ScoreBreakdown::invalid();
        }

        let params = entity.archetype.profile().params();
        let weights = &self.config.weights;

        let preferred = Self::preferred_distance(entity);
        let distance = closeness(candidate.distance(target.position), preferred);

        let allies: Vec<&Combatant> = roster
            .living(entity.faction)
            .into_iter()
            .filter(|ally| ally.id != entity.id)
            .collect();

        let flanking = allies
            .iter()
            .filter(|ally| engages(ally, target))
            .map(|ally| flank_factor(candidate, ally.position, target.position))
            .max()
            .unwrap_or(Fixed::ZERO);

        let ideal = Fixed::from_num(self.config.ideal_ally_spacing_px);
        let ally = allies
            .iter()
            .map(|ally| candidate.distance(ally.position))
            .min()
            .map_or(Fixed::ZERO, |nearest| closeness(nearest, ideal));

        let (covered, around) = grid.cover_around(cell);
        let cover = if around == 0 {
            Fixed::ZERO
        } else {
            Fixed::from_num(covered) / Fixed::from_num(around)
        };

        let target_cell = grid.cell_coords(target.position);
        let line_of_sight = if grid.line_of_sight(cell, target_cell) {
            Fixed::ONE
        } else {
            Fixed::ZERO
        };

        let total = percent(weights.distance_pct) * distance
            + percent(weights.flanking_pct) * percent(params.flanking_pct) * flanking
            + percent(weights.ally_pct) * percent(params.ally_pct) * ally
            + percent(weights.cover_pct) * percent(params.cover_pct) * cover
            + percent(weights.line_of_sight_pct) * percent(params.line_of_sight_pct) * line_of_sight;

        ScoreBreakdown {
            distance,
            flanking,
            ally,
            cover,
            line_of_sight,
            total,
        }
    }

    /// Best sampled position, or `None` to stay put.
    ///
    /// Samples rings around the combatant and one ring at the preferred
    /// distance around the target. The winner must beat the current spot
    /// by the hysteresis margin.
    #[must_use]
    pub fn find_best_tactical_position(
        &self,
        grid: &CombatGrid,
        roster: &Roster,
        entity: &Combatant,
        target: &Combatant,
    ) -> Option<(Vec2Fixed, ScoreBreakdown)> {
        let current = self.evaluate_position(grid, roster, entity, entity.position, target);
        let own_cell = grid.cell_coords(entity.position);

        let mut seen = Vec::new();
        let mut best: Option<(Vec2Fixed, ScoreBreakdown)> = None;
        for raw in self.sample_points(entity, target) {
            if !grid.contains_pixel(raw) {
                continue;
            }
            let cell = grid.cell_coords(raw);
            if cell == own_cell || seen.contains(&cell) {
                continue;
            }
            seen.push(cell);

            let candidate = grid.pixel_center(cell);
            let score = self.evaluate_position(grid, roster, entity, candidate, target);
            if best.map_or(true, |(_, b)| score.total > b.total) {
                best = Some((candidate, score));
            }
        }

        best.filter(|(_, score)| score.total > current.total + self.config.hysteresis())
    }

    fn sample_points(&self, entity: &Combatant, target: &Combatant) -> Vec<Vec2Fixed> {
        let count = usize::try_from(self.config.sample_count)
            .unwrap_or(SAMPLE_DIRECTIONS.len())
            .min(SAMPLE_DIRECTIONS.len());
        let directions = &SAMPLE_DIRECTIONS[..count];
        let radius = Fixed::from_num(self.config.sample_radius_px);

        let around = |center: Vec2Fixed, r: Fixed| {
            directions.iter().map(move |&(dx, dy)| {
                let offset = Vec2Fixed::new(Fixed::from_num(dx), Fixed::from_num(dy))
                    .scale(r / Fixed::from_num(1000));
                center + offset
            })
        };

        let mut points: Vec<Vec2Fixed> = SELF_RINGS
            .iter()
            .flat_map(|&permille| {
                around(entity.position, radius * Fixed::from_num(permille) / Fixed::from_num(1000))
            })
            .collect();
        points.extend(around(target.position, Self::preferred_distance(entity)));
        points
    }

    /// Choose a target among living opponents.
    ///
    /// Ties go to the lowest id.
    #[must_use]
    pub fn select_target(
        &self,
        roster: &Roster,
        entity: &Combatant,
        autopilot: bool,
        rng: &mut BattleRng,
    ) -> Option<EntityId> {
        let candidates = roster.living(entity.faction.opponent());
        if candidates.is_empty() {
            return None;
        }
        let preference = if autopilot {
            TargetPreference::Nearest
        } else {
            entity.archetype.targeting()
        };

        let mut best = candidates[0];
        match preference {
            TargetPreference::Random => return Some(candidates[rng.index(candidates.len())].id),
            TargetPreference::Weakest => {
                for &c in &candidates[1..] {
                    if c.weaker_than(best) {
                        best = c;
                    }
                }
            }
            TargetPreference::Strongest => {
                for &c in &candidates[1..] {
                    if c.stats.attack > best.stats.attack {
                        best = c;
                    }
                }
            }
            TargetPreference::Magical => {
                for &c in &candidates[1..] {
                    if c.stats.magic > best.stats.magic {
                        best = c;
                    }
                }
            }
            TargetPreference::Nearest => {
                let dist = |c: &Combatant| entity.position.distance_squared(c.position);
                for &c in &candidates[1..] {
                    if dist(c) < dist(best) {
                        best = c;
                    }
                }
            }
        }
        Some(best.id)
    }

    /// One AI pass for one combatant.
    ///
    /// Only free combatants decide; anything mid-action holds. The
    /// remembered target is kept while it is alive and hostile.
    #[must_use]
    pub fn decide(
        &self,
        ctx: &AiContext<'_>,
        entity: &Combatant,
        remembered: Option<EntityId>,
        is_moving: bool,
        rng: &mut BattleRng,
    ) -> Decision {
        if !entity.is_alive() || !entity.combat.state().is_free() {
            return Decision::hold(remembered);
        }

        let kept = remembered.filter(|&id| {
            ctx.roster
                .get(id)
                .is_some_and(|t| t.is_alive() && t.faction != entity.faction)
        });
        let Some(target_id) =
            kept.or_else(|| self.select_target(ctx.roster, entity, ctx.autopilot, rng))
        else {
            return Decision::hold(None);
        };
        let Some(target) = ctx.roster.get(target_id) else {
            return Decision::hold(None);
        };

        let range = entity.attack_range();
        let in_range = entity.position.distance(target.position) <= range;
        if in_range && entity.combat.can_attack() {
            return Decision {
                target: Some(target_id),
                intent: Intent::Attack(target_id),
                reassessed: false,
            };
        }

        let mut reassessed = false;
        if ctx.now >= entity.next_reassess_at {
            reassessed = true;
            if let Some((position, score)) =
                self.find_best_tactical_position(ctx.grid, ctx.roster, entity, target)
            {
                if position.distance(target.position) <= range {
                    return Decision {
                        target: Some(target_id),
                        intent: Intent::MoveTo {
                            position,
                            stance: score.stance(),
                        },
                        reassessed,
                    };
                }
            }
        }

        let intent = if !in_range && !is_moving {
            Intent::Approach(target_id)
        } else {
            Intent::Hold
        };
        Decision {
            target: Some(target_id),
            intent,
            reassessed,
        }
    }

    /// Distance an approach should stop at.
    #[must_use]
    pub fn approach_distance(entity: &Combatant) -> Fixed {
        entity.attack_range() * percent(APPROACH_RANGE_PCT)
    }
}

/// `1 − min(1, |d − ideal| / ideal)`.
fn closeness(d: Fixed, ideal: Fixed) -> Fixed {
    if ideal <= Fixed::ZERO {
        return Fixed::ZERO;
    }
    Fixed::ONE - ((d - ideal).abs() / ideal).min(Fixed::ONE)
}

/// An ally counts as engaging when it is attacking the target or has it
/// within reach.
pub(crate) fn engages(ally: &Combatant, target: &Combatant) -> bool {
    ally.combat.target() == Some(target.id)
        || ally.position.distance(target.position) <= ally.attack_range()
}

/// `max(0, −cos θ)` for the angle at the target between the candidate
/// and the ally.
pub(crate) fn flank_factor(candidate: Vec2Fixed, ally: Vec2Fixed, target: Vec2Fixed) -> Fixed {
    let a = candidate - target;
    let b = ally - target;
    let norms = a.length() * b.length();
    if norms == Fixed::ZERO {
        return Fixed::ZERO;
    }
    (-(a.dot(b) / norms)).clamp(Fixed::ZERO, Fixed::ONE)
}
