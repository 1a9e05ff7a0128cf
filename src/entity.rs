//! Entity ids and the entity table.

use crate::bitset::ComponentBits;
use crate::id_stack::IdStack;

/// An entity identifier.
///
/// A bare index into the entity table, recycled from a free-list once an
/// entity is destroyed. Ids are **not** generation-tagged: holding an
/// `Entity` past its `destroy()` and using it again is a caller error, same
/// as the free-list-only contract this ECS is built to (see `DESIGN.md`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity(u32);

impl Entity {
    /// The sentinel "no entity" value. Never returned by `World::create`.
    pub const INVALID: Entity = Entity(0);

    pub(crate) fn from_index(index: u32) -> Self {
        Entity(index)
    }

    /// The dense index backing this id.
    pub fn index(self) -> u32 {
        self.0
    }

    /// True if this is the invalid sentinel.
    pub fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct EntityRecord {
    pub comp_bits: ComponentBits,
    pub active: bool,
    pub ready: bool,
}

/// Per-entity records plus the id free-list. Slot 0 is reserved for
/// [`Entity::INVALID`] and is never handed out by `create()`.
pub(crate) struct EntityTable {
    records: Vec<EntityRecord>,
    free: IdStack<u32>,
}

impl EntityTable {
    pub fn new(initial_entity_count: usize) -> Self {
        let capacity = initial_entity_count.max(1) + 1;
        let records = vec![EntityRecord::default(); capacity];
        let mut free = IdStack::with_capacity(capacity - 1);
        for id in (1..capacity as u32).rev() {
            free.push(id);
        }
        Self { records, free }
    }

    pub fn create(&mut self) -> Entity {
        let id = self.free.pop().unwrap_or_else(|| self.grow());
        let record = &mut self.records[id as usize];
        record.comp_bits = ComponentBits::zero();
        record.active = true;
        record.ready = true;
        Entity::from_index(id)
    }

    /// Double the table and return the first newly-available id, pushing the
    /// rest onto the free-list.
    fn grow(&mut self) -> u32 {
        let old_len = self.records.len();
        let new_len = (old_len * 2).max(old_len + 1);
        self.records.resize(new_len, EntityRecord::default());
        for id in (old_len as u32 + 1..new_len as u32).rev() {
            self.free.push(id);
        }
        old_len as u32
    }

    pub fn is_active(&self, e: Entity) -> bool {
        self.records
            .get(e.index() as usize)
            .map_or(false, |r| r.active)
    }

    pub fn is_ready(&self, e: Entity) -> bool {
        self.records
            .get(e.index() as usize)
            .map_or(false, |r| r.ready)
    }

    pub fn comp_bits(&self, e: Entity) -> ComponentBits {
        self.records[e.index() as usize].comp_bits
    }

    pub fn set_bit(&mut self, e: Entity, comp: usize, on: bool) {
        self.records[e.index() as usize].comp_bits.set(comp, on);
    }

    pub fn mark_not_ready(&mut self, e: Entity) {
        self.records[e.index() as usize].ready = false;
    }

    /// Finalize destruction: zero the record and return the id to the free-list.
    pub fn recycle(&mut self, e: Entity) {
        self.records[e.index() as usize] = EntityRecord::default();
        self.free.push(e.index());
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Reinitialize every record and refill the free-list, keeping capacity.
    pub fn reset(&mut self) {
        for record in &mut self.records {
            *record = EntityRecord::default();
        }
        self.free.clear();
        for id in (1..self.records.len() as u32).rev() {
            self.free.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_recycles_lowest_id_first() {
        let mut table = EntityTable::new(4);
        let e1 = table.create();
        let e2 = table.create();
        assert_eq!(e1.index(), 1);
        assert_eq!(e2.index(), 2);
        table.recycle(e1);
        let e3 = table.create();
        assert_eq!(e3.index(), 1);
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut table = EntityTable::new(1);
        let a = table.create();
        let b = table.create();
        let c = table.create();
        assert_eq!(a.index(), 1);
        assert_eq!(b.index(), 2);
        assert_eq!(c.index(), 3);
        assert!(table.is_active(c));
    }

    #[test]
    fn invalid_entity_is_never_active() {
        let table = EntityTable::new(4);
        assert!(!table.is_active(Entity::INVALID));
        assert!(Entity::INVALID.is_invalid());
    }

    #[test]
    fn reset_clears_records_and_refills_free_list() {
        let mut table = EntityTable::new(4);
        let e1 = table.create();
        table.set_bit(e1, 2, true);
        table.reset();
        assert!(!table.is_active(e1));
        let fresh = table.create();
        assert_eq!(fresh.index(), 1);
        assert!(!table.comp_bits(fresh).test(2));
    }
}
