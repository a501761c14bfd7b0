//! Plain-data party snapshot for persistence.
//!
//! The battle does not save itself. It hands out a [`PartySnapshot`] and
//! the caller stores the bytes wherever it likes.

use serde::{Deserialize, Serialize};

use crate::combatant::{Archetype, Combatant, EntityId, StatBlock};
use crate::config::StatCurve;
use crate::error::{ArenaError, Result};

/// Persistent state of one party member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshot {
    /// Identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Class.
    pub archetype: Archetype,
    /// Level.
    pub level: u32,
    /// Experience towards the next level.
    pub xp: u32,
    /// Stats at that level.
    pub stats: StatBlock,
    /// Health at the time of the snapshot.
    pub hp: i32,
}

impl MemberSnapshot {
    /// Capture a combatant.
    #[must_use]
    pub fn of(combatant: &Combatant) -> Self {
        Self {
            id: combatant.id,
            name: combatant.name.clone(),
            archetype: combatant.archetype,
            level: combatant.level,
            xp: combatant.xp,
            stats: combatant.stats,
            hp: combatant.hp,
        }
    }

    /// Rebuild a combatant. Stats are recomputed from level and curve;
    /// health is clamped to the new maximum.
    #[must_use]
    pub fn restore(&self, curve: &StatCurve) -> Combatant {
        let mut combatant = Combatant::new(self.id, self.name.clone(), self.archetype, self.level, curve);
        combatant.xp = self.xp;
        combatant.hp = self.hp.clamp(0, combatant.stats.max_hp);
        combatant
    }
}

/// Every party member, in id order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartySnapshot {
    /// Members.
    pub members: Vec<MemberSnapshot>,
}

impl PartySnapshot {
    /// Encode with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidState`] if encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| ArenaError::InvalidState(format!("Failed to serialize party: {e}")))
    }

    /// Decode from bincode.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::InvalidState`] if the bytes are not a snapshot.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| ArenaError::InvalidState(format!("Failed to deserialize party: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_bytes_round_trip() {
        let curve = StatCurve::default();
        let mut archer = Combatant::new(3, "Wren", Archetype::Archer, 2, &curve);
        archer.hp = 40;
        archer.xp = 17;
        let snapshot = PartySnapshot {
            members: vec![MemberSnapshot::of(&archer)],
        };

        let bytes = snapshot.to_bytes().expect("encode");
        let decoded = PartySnapshot::from_bytes(&bytes).expect("decode");
        assert_eq!(decoded, snapshot);

        let restored = decoded.members[0].restore(&curve);
        assert_eq!(restored.level, 2);
        assert_eq!(restored.hp, 40);
        assert_eq!(restored.xp, 17);
        assert_eq!(restored.stats, archer.stats);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = PartySnapshot::from_bytes(&[0xff, 0xff, 0xff]).expect_err("garbage");
        assert!(matches!(err, ArenaError::InvalidState(_)));
    }
}
