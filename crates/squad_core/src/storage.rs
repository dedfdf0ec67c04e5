//! Dense storage for all units in the simulation.
//!
//! Units live in a slot table indexed by [`UnitId`]. Handles are handed out
//! sequentially and never reused, so slot order is registration order and
//! iterating slots front to back is deterministic without sorting.

use serde::{Deserialize, Serialize};

use crate::unit::{Unit, UnitId};

/// Slot table of units keyed by stable handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStorage {
    /// One slot per handle ever issued; `None` once removed.
    slots: Vec<Option<Unit>>,
    /// Number of occupied slots.
    live: usize,
}

impl UnitStorage {
    /// Create empty unit storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle the next insert will receive.
    #[must_use]
    pub fn next_id(&self) -> UnitId {
        UnitId::new(u32::try_from(self.slots.len()).unwrap_or(u32::MAX))
    }

    /// Insert a unit built for the next handle and return that handle.
    pub fn insert_with(&mut self, build: impl FnOnce(UnitId) -> Unit) -> UnitId {
        let id = self.next_id();
        self.slots.push(Some(build(id)));
        self.live += 1;
        id
    }

    /// Remove a unit by handle. The handle is never reissued.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit> {
        let removed = self.slots.get_mut(id.index()).and_then(Option::take);
        if removed.is_some() {
            self.live -= 1;
        }
        removed
    }

    /// Get a unit by handle.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Get a mutable reference to a unit by handle.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Borrow two distinct units mutably at once.
    ///
    /// Returns `None` if the handles are equal or either slot is empty.
    pub fn pair_mut(&mut self, first: UnitId, second: UnitId) -> Option<(&mut Unit, &mut Unit)> {
        let (a, b) = (first.index(), second.index());
        if a == b || a >= self.slots.len() || b >= self.slots.len() {
            return None;
        }

        if a < b {
            let (head, tail) = self.slots.split_at_mut(b);
            Some((head[a].as_mut()?, tail[0].as_mut()?))
        } else {
            let (head, tail) = self.slots.split_at_mut(a);
            Some((tail[0].as_mut()?, head[b].as_mut()?))
        }
    }

    /// Check if a unit exists.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.get(id).is_some()
    }

    /// Number of stored units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of handles ever issued (the dense table length).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Stored handles in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<UnitId> {
        self.iter().map(Unit::id).collect()
    }

    /// Iterate stored units in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Unit> {
        self.slots.iter().filter_map(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factions::Faction;
    use crate::math::Vec3Fixed;
    use crate::template::StatTemplate;

    fn insert(storage: &mut UnitStorage, faction: Faction) -> UnitId {
        let template = StatTemplate::infantry_squad();
        storage.insert_with(|id| Unit::new(id, faction, Vec3Fixed::ZERO, &template))
    }

    #[test]
    fn test_handles_are_sequential_and_not_reused() {
        let mut storage = UnitStorage::new();
        let a = insert(&mut storage, Faction::Allied);
        let b = insert(&mut storage, Faction::Coalition);
        assert_eq!(a, UnitId::new(0));
        assert_eq!(b, UnitId::new(1));

        assert!(storage.remove(a).is_some());
        assert!(storage.remove(a).is_none());
        let c = insert(&mut storage, Faction::Allied);
        assert_eq!(c, UnitId::new(2));
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.slot_count(), 3);
        assert_eq!(storage.ids(), vec![b, c]);
    }

    #[test]
    fn test_stored_unit_knows_its_handle() {
        let mut storage = UnitStorage::new();
        let id = insert(&mut storage, Faction::Allied);
        assert_eq!(storage.get(id).unwrap().id(), id);
    }

    #[test]
    fn test_pair_mut_both_orders() {
        let mut storage = UnitStorage::new();
        let a = insert(&mut storage, Faction::Allied);
        let b = insert(&mut storage, Faction::Coalition);

        let (x, y) = storage.pair_mut(a, b).unwrap();
        assert_eq!((x.id(), y.id()), (a, b));
        let (x, y) = storage.pair_mut(b, a).unwrap();
        assert_eq!((x.id(), y.id()), (b, a));
    }

    #[test]
    fn test_pair_mut_rejects_same_or_missing() {
        let mut storage = UnitStorage::new();
        let a = insert(&mut storage, Faction::Allied);
        let b = insert(&mut storage, Faction::Coalition);

        assert!(storage.pair_mut(a, a).is_none());
        assert!(storage.pair_mut(a, UnitId::new(99)).is_none());
        storage.remove(b);
        assert!(storage.pair_mut(a, b).is_none());
    }
}
