//! Combatant storage.
//!
//! A `HashMap` gives O(1) lookup by id; anything that mutates battle
//! state iterates [`Roster::sorted_ids`] so runs are reproducible.

use std::collections::HashMap;

use crate::combatant::{Combatant, EntityId, Faction};
use crate::math::Vec2Fixed;
use crate::movement::PositionStore;

/// All combatants of a battle, dead ones included.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    combatants: HashMap<EntityId, Combatant>,
}

impl Roster {
    /// Empty roster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a combatant, replacing any with the same id.
    pub fn insert(&mut self, combatant: Combatant) -> Option<Combatant> {
        self.combatants.insert(combatant.id, combatant)
    }

    /// Remove a combatant.
    pub fn remove(&mut self, id: EntityId) -> Option<Combatant> {
        self.combatants.remove(&id)
    }

    /// Look up a combatant.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    /// Look up a combatant mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    /// True if the id is known.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.combatants.contains_key(&id)
    }

    /// Number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// True if there are no combatants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }

    /// Ids in ascending order.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.combatants.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Combatants in ascending id order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Combatant> {
        self.sorted_ids()
            .into_iter()
            .filter_map(|id| self.combatants.get(&id))
            .collect()
    }

    /// Living members of a faction in ascending id order.
    #[must_use]
    pub fn living(&self, faction: Faction) -> Vec<&Combatant> {
        self.sorted()
            .into_iter()
            .filter(|c| c.faction == faction && c.is_alive())
            .collect()
    }

    /// Number of living members of a faction.
    #[must_use]
    pub fn living_count(&self, faction: Faction) -> usize {
        self.combatants
            .values()
            .filter(|c| c.faction == faction && c.is_alive())
            .count()
    }

    /// True if `id` is alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Combatant::is_alive)
    }

    /// Unordered iteration.
    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }
}

impl PositionStore for Roster {
    fn position(&self, id: EntityId) -> Option<Vec2Fixed> {
        self.get(id).map(|c| c.position)
    }

    fn set_position(&mut self, id: EntityId, position: Vec2Fixed) {
        if let Some(combatant) = self.get_mut(id) {
            combatant.position = position;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combatant::Archetype;
    use crate::config::StatCurve;

    fn unit(id: EntityId, archetype: Archetype) -> Combatant {
        Combatant::new(id, format!("u{id}"), archetype, 1, &StatCurve::default())
    }

    #[test]
    fn test_sorted_ids() {
        let mut roster = Roster::new();
        for id in [9, 2, 5] {
            roster.insert(unit(id, Archetype::Goblin));
        }
        assert_eq!(roster.sorted_ids(), vec![2, 5, 9]);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_living_by_faction() {
        let mut roster = Roster::new();
        roster.insert(unit(1, Archetype::Warrior));
        roster.insert(unit(2, Archetype::Goblin));
        roster.insert(unit(3, Archetype::Orc));
        if let Some(orc) = roster.get_mut(3) {
            orc.hp = 0;
        }

        assert_eq!(roster.living_count(Faction::Enemies), 1);
        assert_eq!(roster.living(Faction::Party).len(), 1);
        assert!(!roster.is_alive(3));
        assert!(!roster.is_alive(42));
    }

    #[test]
    fn test_position_store() {
        let mut roster = Roster::new();
        roster.insert(unit(1, Archetype::Archer));
        roster.set_position(1, Vec2Fixed::from_ints(30, 40));
        assert_eq!(roster.position(1), Some(Vec2Fixed::from_ints(30, 40)));
        roster.set_position(7, Vec2Fixed::ZERO);
        assert_eq!(roster.position(7), None);
    }
}
