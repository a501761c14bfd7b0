//! Seeded random source for combat rolls.

use serde::{Deserialize, Serialize};

use crate::math::Fixed;

/// Simple deterministic RNG owned by a battle.
///
/// Every dodge, interrupt, critical and targeting roll goes through one
/// instance, so a battle replays identically from its seed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BattleRng {
    state: u64,
}

impl BattleRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(0x9E37_79B9_7F4A_7C15),
        }
    }

    /// Advance and return the raw state.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(0x5_DEEC_E66D).wrapping_add(11);
        self.state
    }

    /// Uniform value in `[0, 1)`.
    ///
    /// Built from the high 32 bits; the low bits of this generator are weak.
    pub fn next_fraction(&mut self) -> Fixed {
        Fixed::from_bits((self.next_u64() >> 32) as i64)
    }

    /// Returns true with probability `p` (clamped to `[0, 1]`).
    pub fn chance(&mut self, p: Fixed) -> bool {
        if p <= Fixed::ZERO {
            return false;
        }
        self.next_fraction() < p
    }

    /// Uniform integer in `[min, max]` inclusive.
    pub fn range_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = u64::from(max - min) + 1;
        min + ((self.next_u64() >> 32) % span) as u32
    }

    /// Uniform index into a slice of `len` elements. `len` must be non-zero.
    pub fn index(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        ((self.next_u64() >> 32) % len as u64) as usize
    }
}
