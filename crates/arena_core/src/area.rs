//! Area effects: shapes on the field and what happens to whoever stands
//! inside them.
//!
//! Shapes are tested against combatant positions in pixels. Directional
//! shapes (cones and lines) point along a direction vector from their
//! origin.

use serde::{Deserialize, Serialize};

use crate::combatant::DamageKind;
use crate::events::Control;
use crate::math::{cos_deg, Fixed, Vec2Fixed, HALF};

/// Region covered by an area effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaShape {
    /// Everything within `radius_px` of the origin.
    Circle {
        /// Radius in pixels.
        radius_px: u32,
    },
    /// A wedge of `angle_deg` centred on the direction, out to `range_px`.
    Cone {
        /// Reach in pixels.
        range_px: u32,
        /// Full opening angle in degrees.
        angle_deg: u32,
    },
    /// A beam from the origin along the direction.
    Line {
        /// Length in pixels.
        length_px: u32,
        /// Full width in pixels.
        width_px: u32,
    },
    /// An axis-aligned square centred on the origin.
    Square {
        /// Side length in pixels.
        size_px: u32,
    },
}

impl AreaShape {
    /// True if `point` lies inside the shape placed at `origin` facing
    /// `direction`. A zero direction faces east.
    #[must_use]
    pub fn contains(&self, origin: Vec2Fixed, direction: Vec2Fixed, point: Vec2Fixed) -> bool {
        let offset = point - origin;
        let facing = if direction == Vec2Fixed::ZERO {
            Vec2Fixed::new(Fixed::ONE, Fixed::ZERO)
        } else {
            direction.normalize()
        };
        match *self {
            Self::Circle { radius_px } => {
                let r = Fixed::from_num(radius_px);
                offset.dot(offset) <= r * r
            }
            Self::Cone {
                range_px,
                angle_deg,
            } => {
                let r = Fixed::from_num(range_px);
                if offset.dot(offset) > r * r {
                    return false;
                }
                if offset == Vec2Fixed::ZERO {
                    return true;
                }
                let half_angle = i32::try_from(angle_deg.min(360) / 2).unwrap_or(180);
                facing.dot(offset) >= offset.length() * cos_deg(half_angle)
            }
            Self::Line {
                length_px,
                width_px,
            } => {
                let along = facing.dot(offset);
                if along < Fixed::ZERO || along > Fixed::from_num(length_px) {
                    return false;
                }
                let across = (offset - facing.scale(along)).length();
                across <= Fixed::from_num(width_px) * HALF
            }
            Self::Square { size_px } => {
                let half = Fixed::from_num(size_px) * HALF;
                offset.x.abs() <= half && offset.y.abs() <= half
            }
        }
    }
}

/// Crowd control an area effect may inflict on each victim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaControl {
    /// Effect applied.
    pub control: Control,
    /// Chance per victim, in percent.
    pub chance_pct: u32,
}

/// A named area effect.
///
/// Damage hits every combatant inside except the source. Healing only
/// reaches the source's faction, or everyone inside when there is no
/// source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaEffect {
    /// Display name.
    pub name: String,
    /// Region.
    pub shape: AreaShape,
    /// Raw damage per victim, before defense.
    #[serde(default)]
    pub damage: i32,
    /// Kind of damage dealt.
    #[serde(default = "physical")]
    pub damage_kind: DamageKind,
    /// Health restored per ally.
    #[serde(default)]
    pub heal: i32,
    /// Optional crowd control.
    #[serde(default)]
    pub control: Option<AreaControl>,
}

const fn physical() -> DamageKind {
    DamageKind::Physical
}

impl AreaEffect {
    /// True if the effect deals damage.
    #[must_use]
    pub const fn is_harmful(&self) -> bool {
        self.damage > 0 || self.control.is_some()
    }

    /// Fiery burst: radius 80, 40 magical damage.
    #[must_use]
    pub fn fireball() -> Self {
        Self {
            name: "Fireball".into(),
            shape: AreaShape::Circle { radius_px: 80 },
            damage: 40,
            damage_kind: DamageKind::Magical,
            heal: 0,
            control: None,
        }
    }

    /// Beam 300 long and 30 wide, 50 magical damage, 30% stun.
    #[must_use]
    pub fn lightning_bolt() -> Self {
        Self {
            name: "Lightning Bolt".into(),
            shape: AreaShape::Line {
                length_px: 300,
                width_px: 30,
            },
            damage: 50,
            damage_kind: DamageKind::Magical,
            heal: 0,
            control: Some(AreaControl {
                control: Control::Stun,
                chance_pct: 30,
            }),
        }
    }

    /// Ground slam: radius 120, 20 physical damage, 50% knock-back.
    #[must_use]
    pub fn shockwave() -> Self {
        Self {
            name: "Shockwave".into(),
            shape: AreaShape::Circle { radius_px: 120 },
            damage: 20,
            damage_kind: DamageKind::Physical,
            heal: 0,
            control: Some(AreaControl {
                control: Control::KnockBack,
                chance_pct: 50,
            }),
        }
    }

    /// Cone of frost: 150 deep, 60°, 25 magical damage.
    #[must_use]
    pub fn frost_cone() -> Self {
        Self {
            name: "Frost Cone".into(),
            shape: AreaShape::Cone {
                range_px: 150,
                angle_deg: 60,
            },
            damage: 25,
            damage_kind: DamageKind::Magical,
            heal: 0,
            control: None,
        }
    }

    /// Healing circle: radius 60, restores 30.
    #[must_use]
    pub fn heal_circle() -> Self {
        Self {
            name: "Heal Circle".into(),
            shape: AreaShape::Circle { radius_px: 60 },
            damage: 0,
            damage_kind: DamageKind::Magical,
            heal: 30,
            control: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(x: i32, y: i32) -> Vec2Fixed {
        Vec2Fixed::from_ints(x, y)
    }

    const EAST: Vec2Fixed = Vec2Fixed::new(Fixed::ONE, Fixed::ZERO);

    #[test]
    fn test_circle() {
        let shape = AreaShape::Circle { radius_px: 80 };
        let origin = px(200, 200);
        assert!(shape.contains(origin, EAST, origin));
        assert!(shape.contains(origin, EAST, px(280, 200)));
        assert!(!shape.contains(origin, EAST, px(260, 260)));
    }

    #[test]
    fn test_cone_opens_along_direction() {
        let shape = AreaShape::Cone {
            range_px: 150,
            angle_deg: 60,
        };
        let origin = px(100, 100);
        assert!(shape.contains(origin, EAST, px(200, 100)));
        // 20° off axis is inside a 60° cone, 45° is not.
        assert!(shape.contains(origin, EAST, px(194, 134)));
        assert!(!shape.contains(origin, EAST, px(170, 170)));
        // Behind.
        assert!(!shape.contains(origin, EAST, px(50, 100)));
        // Too far.
        assert!(!shape.contains(origin, EAST, px(260, 100)));

        let south = px(0, 1);
        assert!(shape.contains(origin, south, px(100, 200)));
        assert!(!shape.contains(origin, south, px(200, 100)));
    }

    #[test]
    fn test_line_has_width_and_length() {
        let shape = AreaShape::Line {
            length_px: 300,
            width_px: 30,
        };
        let origin = px(0, 100);
        assert!(shape.contains(origin, EAST, px(150, 110)));
        assert!(!shape.contains(origin, EAST, px(150, 120)));
        assert!(!shape.contains(origin, EAST, px(320, 100)));
        assert!(!shape.contains(origin, EAST, px(-10, 100)));
        // A zero direction faces east.
        assert!(shape.contains(origin, Vec2Fixed::ZERO, px(299, 100)));
    }

    #[test]
    fn test_square() {
        let shape = AreaShape::Square { size_px: 100 };
        let origin = px(100, 100);
        assert!(shape.contains(origin, EAST, px(150, 50)));
        assert!(!shape.contains(origin, EAST, px(151, 100)));
    }

    #[test]
    fn test_templates() {
        assert!(AreaEffect::fireball().is_harmful());
        assert!(AreaEffect::shockwave().is_harmful());
        assert!(!AreaEffect::heal_circle().is_harmful());
        assert_eq!(
            AreaEffect::lightning_bolt().control.map(|c| c.control),
            Some(Control::Stun)
        );
    }

    #[test]
    fn test_effect_from_ron() {
        let effect: AreaEffect =
            ron::from_str("(name:\"Spikes\",shape:Square(size_px:80),damage:12)").expect("RON");
        assert_eq!(effect.damage_kind, DamageKind::Physical);
        assert_eq!(effect.heal, 0);
        assert!(effect.control.is_none());
    }
}
