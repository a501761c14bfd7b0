//! Fixed-point math utilities for deterministic simulation.
//!
//! Positions, distances, speeds and timestamps are all fixed-point.
//! Two runs fed the same seed and the same tick deltas produce
//! bit-identical battles.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// One half.
pub const HALF: Fixed = Fixed::from_bits(1 << 31);

/// √2, the cost of a diagonal grid step.
pub const SQRT_2: Fixed = Fixed::from_bits(6_074_001_000);

/// Builds a fixed-point value from a whole number of thousandths.
///
/// Tuning constants are written this way so no float ever touches
/// simulation state.
#[must_use]
pub fn milli(thousandths: i32) -> Fixed {
    Fixed::from_num(thousandths) / Fixed::from_num(1000)
}

/// π.
pub const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// Cosine of a whole number of degrees.
///
/// Folded into `[0°, 90°]` and summed as a Taylor series, which is
/// accurate to about 1e-6 there.
#[must_use]
pub fn cos_deg(degrees: i32) -> Fixed {
    let folded = degrees.rem_euclid(360);
    let folded = if folded > 180 { 360 - folded } else { folded };
    if folded > 90 {
        return -cos_deg(180 - folded);
    }
    let x = Fixed::from_num(folded) * PI / Fixed::from_num(180);
    let x2 = x * x;
    let mut term = Fixed::ONE;
    let mut sum = Fixed::ONE;
    for n in 1..=5 {
        let k = 2 * n;
        term = -term * x2 / Fixed::from_num(k * (k - 1));
        sum += term;
    }
    sum
}

/// Microseconds per second; the resolution of the simulation clock.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Rounds a time in seconds to whole microseconds.
///
/// The scheduler keeps its clock in integer microseconds so repeated
/// tick deltas sum exactly.
#[must_use]
pub fn to_micros(seconds: Fixed) -> i64 {
    let scaled = i128::from(seconds.to_bits()) * i128::from(MICROS_PER_SEC);
    let rounded = (scaled + (1 << 31)) >> 32;
    i64::try_from(rounded).unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX })
}

/// Seconds for a whole number of microseconds, saturating at the
/// range of [`Fixed`].
#[must_use]
pub fn from_micros(micros: i64) -> Fixed {
    let bits = (i128::from(micros) << 32) / i128::from(MICROS_PER_SEC);
    Fixed::from_bits(i64::try_from(bits).unwrap_or(if bits < 0 { i64::MIN } else { i64::MAX }))
}

/// Builds a fixed-point value from a percentage (`150` is `1.5`).
#[must_use]
pub fn percent(pct: i32) -> Fixed {
    Fixed::from_num(pct) / Fixed::from_num(100)
}

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole pixel coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Multiply both components by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Move from `self` towards `target` by at most `max_distance`.
    ///
    /// Returns the reached point and the part of `max_distance` left over
    /// (zero unless `target` was reached).
    #[must_use]
    pub fn step_towards(self, target: Self, max_distance: Fixed) -> (Self, Fixed) {
        let remaining = self.distance(target);
        if remaining <= max_distance {
            return (target, max_distance - remaining);
        }
        if remaining == Fixed::ZERO {
            return (target, max_distance);
        }
        (self.lerp(target, max_distance / remaining), Fixed::ZERO)
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 64 halvings reach the last fractional bit for any arena-sized value.
    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid == low {
            break;
        }
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}
