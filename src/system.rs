//! System handles, their matching signatures, and the callbacks attached to
//! them.
//!
//! A system's bookkeeping (its active flag, category mask, require/exclude
//! signature, and matched-entity set) lives in [`SystemMeta`] inside
//! `World`, always reachable through a plain `&mut self.system_meta[..]`.
//! Its callbacks live separately, boxed behind the object-safe
//! [`AnySystemCallbacks`], so a running system's own callback slot can be
//! taken out of the table for the duration of the call — the same
//! take-then-restore trick the reference design gets from `AtomicRefCell`,
//! done here with a plain `Option` since this ECS is single-threaded by
//! design (see `DESIGN.md`).

use std::any::Any;
use std::marker::PhantomData;

use crate::bitset::ComponentBits;
use crate::entity::Entity;
use crate::sparse_set::SparseSet;
use crate::World;

pub const MAX_SYSTEMS: usize = 16;

/// The system callback itself: given the entities currently matching the
/// system's signature, do whatever work the system exists to do. The
/// returned `i32` is an opaque status code; a nonzero value short-circuits
/// `run_systems`.
pub type SystemFn<U> = Box<dyn FnMut(&mut World, &[Entity], &mut U) -> i32>;
/// Fired once, right after an entity starts matching a system's signature.
pub type AddCb<U> = Box<dyn FnMut(&mut World, Entity, &mut U)>;
/// Fired once, right before an entity stops matching a system's signature
/// (including when the entity itself is destroyed).
pub type RemoveCb<U> = Box<dyn FnMut(&mut World, Entity, &mut U)>;

/// A typed handle to a defined system.
pub struct System<U> {
    id: u32,
    _marker: PhantomData<fn() -> U>,
}

impl<U> System<U> {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<U> Clone for System<U> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<U> Copy for System<U> {}
impl<U> PartialEq for System<U> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<U> Eq for System<U> {}
impl<U> std::fmt::Debug for System<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System").field("id", &self.id).finish()
    }
}

/// Matching state for one system: everything needed to decide membership,
/// kept separate from its callbacks so matching can proceed even while the
/// system's own callback is mid-call.
pub(crate) struct SystemMeta {
    pub active: bool,
    pub mask: u32,
    pub require_bits: ComponentBits,
    pub exclude_bits: ComponentBits,
    pub members: SparseSet,
}

impl SystemMeta {
    pub fn new(mask: u32) -> Self {
        Self {
            active: true,
            mask,
            require_bits: ComponentBits::zero(),
            exclude_bits: ComponentBits::zero(),
            members: SparseSet::new(),
        }
    }

    /// True if an entity with `bits` set belongs in this system.
    pub fn matches(&self, bits: &ComponentBits) -> bool {
        bits.contains_all(&self.require_bits)
            && (self.exclude_bits.is_zero() || !bits.intersects(&self.exclude_bits))
    }

    /// True if this system's signature even references component `comp_id`
    /// (used to scope the narrower matching pass `World::remove` runs).
    pub fn cares_about(&self, comp_id: usize) -> bool {
        self.require_bits.test(comp_id) || self.exclude_bits.test(comp_id)
    }
}

/// Object-safe face of a system's callbacks.
pub(crate) trait AnySystemCallbacks: Any {
    fn call_system(&mut self, world: &mut World, entities: &[Entity]) -> i32;
    fn call_add(&mut self, world: &mut World, entity: Entity);
    fn call_remove(&mut self, world: &mut World, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

pub(crate) struct SystemCallbacks<U> {
    pub system_cb: SystemFn<U>,
    pub add_cb: Option<AddCb<U>>,
    pub remove_cb: Option<RemoveCb<U>>,
    pub udata: U,
}

impl<U: 'static> AnySystemCallbacks for SystemCallbacks<U> {
    fn call_system(&mut self, world: &mut World, entities: &[Entity]) -> i32 {
        (self.system_cb)(world, entities, &mut self.udata)
    }

    fn call_add(&mut self, world: &mut World, entity: Entity) {
        if let Some(cb) = &mut self.add_cb {
            cb(world, entity, &mut self.udata);
        }
    }

    fn call_remove(&mut self, world: &mut World, entity: Entity) {
        if let Some(cb) = &mut self.remove_cb {
            cb(world, entity, &mut self.udata);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
