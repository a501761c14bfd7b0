//! Situational strike modifiers: flanking and cover.
//!
//! Both are worked out from positions at the moment a strike resolves.
//! Cover is directional: a barrier only shelters against attackers on
//! its side of the defender.

use serde::{Deserialize, Serialize};

use crate::combatant::Combatant;
use crate::grid::{CombatGrid, NEIGHBOR_OFFSETS};
use crate::math::{milli, percent, Fixed, Vec2Fixed};
use crate::roster::Roster;
use crate::tactics::{engages, flank_factor};

/// Flank factor (`−cos θ` at the target) an attacker needs to count as
/// flanking: the attacker and an engaged ally are at least 120° apart.
const FLANK_THRESHOLD_PCT: i32 = 50;

/// Extra damage dealt from a flank.
pub const FLANK_DAMAGE_PCT: i32 = 10;

/// Dodge chance a flanked defender loses.
pub const FLANK_DODGE_PENALTY_MILLI: i32 = 150;

/// Dodge chance never exceeds this.
pub const MAX_DODGE_MILLI: i32 = 950;

/// How well a defender is sheltered against one attacker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum CoverLevel {
    /// Nothing between them.
    #[default]
    None,
    /// One sheltering cell on the attacker's side.
    Half,
    /// Two or more sheltering cells on the attacker's side.
    ThreeQuarters,
}

impl CoverLevel {
    /// Share of damage the cover absorbs, in percent.
    #[must_use]
    pub const fn damage_reduction_pct(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Half => 25,
            Self::ThreeQuarters => 50,
        }
    }

    /// Dodge chance the cover adds.
    #[must_use]
    pub fn evasion_bonus(self) -> Fixed {
        match self {
            Self::None => Fixed::ZERO,
            Self::Half => milli(100),
            Self::ThreeQuarters => milli(200),
        }
    }
}

/// Cover a defender at `defender` has against an attacker at `attacker`.
///
/// Counts the cover-giving cells around the defender's cell that lie in
/// the attacker's half-plane.
#[must_use]
pub fn cover_against(grid: &CombatGrid, defender: Vec2Fixed, attacker: Vec2Fixed) -> CoverLevel {
    let cell = grid.cell_coords(defender);
    let toward = attacker - defender;
    if toward == Vec2Fixed::ZERO {
        return CoverLevel::None;
    }
    let sheltering = NEIGHBOR_OFFSETS
        .iter()
        .map(|&(dr, dc)| cell.offset(dr, dc))
        .filter(|&next| grid.in_bounds(next) && grid.cell_type(next).provides_cover())
        .filter(|&next| (grid.pixel_center(next) - defender).dot(toward) > Fixed::ZERO)
        .count();
    match sheltering {
        0 => CoverLevel::None,
        1 => CoverLevel::Half,
        _ => CoverLevel::ThreeQuarters,
    }
}

/// True when another living ally of the attacker engages the target from
/// the opposite side.
#[must_use]
pub fn is_flanking(roster: &Roster, attacker: &Combatant, target: &Combatant) -> bool {
    let threshold = percent(FLANK_THRESHOLD_PCT);
    roster
        .living(attacker.faction)
        .into_iter()
        .filter(|ally| ally.id != attacker.id && engages(ally, target))
        .any(|ally| flank_factor(attacker.position, ally.position, target.position) >= threshold)
}

/// Flanking and cover for one strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrikeModifiers {
    /// The attacker strikes from a flank.
    pub flanking: bool,
    /// The target's cover against the attacker.
    pub cover: CoverLevel,
}

impl StrikeModifiers {
    /// Modifiers for `attacker` striking `target` where they stand now.
    #[must_use]
    pub fn evaluate(
        grid: &CombatGrid,
        roster: &Roster,
        attacker: &Combatant,
        target: &Combatant,
    ) -> Self {
        Self {
            flanking: is_flanking(roster, attacker, target),
            cover: cover_against(grid, target.position, attacker.position),
        }
    }

    /// The target's dodge chance after cover and flanking.
    #[must_use]
    pub fn dodge_chance(&self, base: Fixed) -> Fixed {
        let mut chance = base + self.cover.evasion_bonus();
        if self.flanking {
            chance -= milli(FLANK_DODGE_PENALTY_MILLI);
        }
        chance.clamp(Fixed::ZERO, milli(MAX_DODGE_MILLI))
    }

    /// Damage after defense, adjusted for flanking and cover. Never
    /// below 1.
    #[must_use]
    pub fn adjust_damage(&self, mitigated: i32) -> i32 {
        let mut damage = i64::from(mitigated);
        if self.flanking {
            damage = damage * i64::from(100 + FLANK_DAMAGE_PCT) / 100;
        }
        damage = damage * i64::from(100 - self.cover.damage_reduction_pct()) / 100;
        i32::try_from(damage).unwrap_or(i32::MAX).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Archetype;
    use crate::config::StatCurve;
    use crate::grid::{CellType, GridCoord};

    fn px(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    fn unit(id: u64, archetype: Archetype, at: Vec2Fixed) -> Combatant {
        Combatant::new(id, "u", archetype, 1, &StatCurve::default()).at(at)
    }

    #[test]
    fn test_cover_only_faces_the_barrier_side() {
        let mut grid = CombatGrid::new(800, 600, 40);
        // Defender at (5, 5); cover to its east.
        grid.set_cell_type(GridCoord::new(5, 6), CellType::Cover);
        let defender = grid.pixel_center(GridCoord::new(5, 5));

        assert_eq!(cover_against(&grid, defender, px(500, 220)), CoverLevel::Half);
        assert_eq!(cover_against(&grid, defender, px(20, 220)), CoverLevel::None);

        grid.set_cell_type(GridCoord::new(4, 6), CellType::Obstacle);
        assert_eq!(
            cover_against(&grid, defender, px(500, 220)),
            CoverLevel::ThreeQuarters
        );
        assert_eq!(cover_against(&grid, defender, defender), CoverLevel::None);
    }

    #[test]
    fn test_flanking_needs_an_engaged_ally_opposite() {
        let mut roster = Roster::new();
        roster.insert(unit(1, Archetype::Warrior, px(100, 300)));
        roster.insert(unit(2, Archetype::Warrior, px(180, 300)));
        roster.insert(unit(10, Archetype::Goblin, px(140, 300)));
        let target = roster.get(10).cloned().expect("goblin");
        let attacker = roster.get(1).cloned().expect("warrior");
        assert!(is_flanking(&roster, &attacker, &target));

        // Same side is not a flank.
        if let Some(ally) = roster.get_mut(2) {
            ally.position = px(100, 340);
        }
        assert!(!is_flanking(&roster, &attacker, &target));

        // Alone is not a flank.
        roster.remove(2);
        assert!(!is_flanking(&roster, &attacker, &target));
    }

    #[test]
    fn test_damage_and_dodge_adjustments() {
        let plain = StrikeModifiers::default();
        assert_eq!(plain.adjust_damage(20), 20);
        assert_eq!(plain.dodge_chance(milli(75)), milli(75));

        let flank = StrikeModifiers {
            flanking: true,
            cover: CoverLevel::None,
        };
        assert_eq!(flank.adjust_damage(20), 22);
        assert_eq!(flank.dodge_chance(milli(75)), Fixed::ZERO);

        let sheltered = StrikeModifiers {
            flanking: false,
            cover: CoverLevel::ThreeQuarters,
        };
        assert_eq!(sheltered.adjust_damage(20), 10);
        assert_eq!(sheltered.adjust_damage(1), 1);
        assert_eq!(sheltered.dodge_chance(milli(900)), milli(MAX_DODGE_MILLI));
    }
}
