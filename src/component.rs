//! Typed component handles and the type-erased storage backing them.
//!
//! Each defined component type gets a dense, directly-indexed
//! [`ComponentStore<T>`]; the table that owns all of them keeps them behind
//! `Box<dyn AnyComponentStore>` and recovers the concrete type through
//! `std::any::Any` downcasting at the handful of call sites that need it
//! (`get`, `get_mut`, `add`, `remove`). This is the same shape
//! `kyren-simplecs`'s `GenericComponentEntry` uses, adapted to be indexed by
//! a dense runtime id instead of `TypeId`, since `define_component` assigns
//! ids in definition order rather than keying off Rust's type identity.

use std::any::Any;
use std::marker::PhantomData;

use crate::bitset::MAX_COMPONENTS;
use crate::entity::Entity;
use crate::error::EcsError;

/// Called when a component value is inserted into an entity, after the value
/// is stored but before `add()` returns.
pub type Ctor<T> = Box<dyn FnMut(&mut T, Entity)>;
/// Called when a component value is removed from an entity (explicitly,
/// via the deferred queue, on `destroy`, or on `World::reset`), just before
/// the value is dropped.
pub type Dtor<T> = Box<dyn FnMut(&mut T, Entity)>;

/// A typed handle to a component definition.
///
/// Carries no data of its own beyond a dense id; the phantom type parameter
/// exists purely so the compiler rejects using one component's handle to
/// index another component's storage.
pub struct Component<T> {
    id: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Component<T> {
    pub(crate) fn new(id: u32) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// The dense id assigned by `define_component`.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Component<T> {}
impl<T> PartialEq for Component<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl<T> Eq for Component<T> {}
impl<T> std::fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component").field("id", &self.id).finish()
    }
}

/// Object-safe face of a component store, used by the table to run
/// destructors without knowing the concrete component type.
trait AnyComponentStore: Any {
    /// Drop the stored value for `entity`, if present, running the
    /// registered destructor first. No-op if nothing was ever inserted.
    fn destroy_entity(&mut self, entity: Entity);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense, directly-indexed storage for one component type.
///
/// Slots are indexed by `Entity::index()` and grow by doubling, same
/// amortized-O(1)-append shape as `UntypedComponentStore::allocate_enough`
/// in the reference design, just over `Vec<Option<T>>` instead of raw bytes
/// behind a `Layout` — our components are plain `T: 'static`, not reflected
/// data, so there's no need for the byte-level machinery.
pub(crate) struct ComponentStore<T> {
    slots: Vec<Option<T>>,
    ctor: Option<Ctor<T>>,
    dtor: Option<Dtor<T>>,
}

impl<T> ComponentStore<T> {
    fn new(ctor: Option<Ctor<T>>, dtor: Option<Dtor<T>>) -> Self {
        Self {
            slots: Vec::new(),
            ctor,
            dtor,
        }
    }

    fn ensure_capacity(&mut self, index: usize) {
        if index >= self.slots.len() {
            let mut new_len = self.slots.len().max(1);
            while new_len <= index {
                new_len *= 2;
            }
            self.slots.resize_with(new_len, || None);
        }
    }

    pub fn insert(&mut self, entity: Entity, value: T) {
        let idx = entity.index() as usize;
        self.ensure_capacity(idx);
        self.slots[idx] = Some(value);
        if let Some(ctor) = &mut self.ctor {
            ctor(self.slots[idx].as_mut().unwrap(), entity);
        }
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.slots.get(entity.index() as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.slots.get_mut(entity.index() as usize)?.as_mut()
    }

    pub fn remove(&mut self, entity: Entity) -> Option<T> {
        let mut value = self.slots.get_mut(entity.index() as usize)?.take()?;
        if let Some(dtor) = &mut self.dtor {
            dtor(&mut value, entity);
        }
        Some(value)
    }
}

impl<T: 'static> AnyComponentStore for ComponentStore<T> {
    fn destroy_entity(&mut self, entity: Entity) {
        self.remove(entity);
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Owns every defined component's storage, keyed by dense id.
pub(crate) struct ComponentTable {
    stores: Vec<Box<dyn AnyComponentStore>>,
}

impl ComponentTable {
    pub fn new() -> Self {
        Self { stores: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn define<T: 'static>(
        &mut self,
        ctor: Option<Ctor<T>>,
        dtor: Option<Dtor<T>>,
    ) -> Result<Component<T>, EcsError> {
        if self.stores.len() >= MAX_COMPONENTS {
            return Err(EcsError::TooManyComponents(MAX_COMPONENTS));
        }
        let id = self.stores.len() as u32;
        self.stores.push(Box::new(ComponentStore::<T>::new(ctor, dtor)));
        Ok(Component::new(id))
    }

    pub fn store<T: 'static>(&self, comp: Component<T>) -> &ComponentStore<T> {
        self.stores[comp.id() as usize]
            .as_any()
            .downcast_ref()
            .expect("component handle does not match its definition")
    }

    pub fn store_mut<T: 'static>(&mut self, comp: Component<T>) -> &mut ComponentStore<T> {
        self.stores[comp.id() as usize]
            .as_any_mut()
            .downcast_mut()
            .expect("component handle does not match its definition")
    }

    /// Run the destructor (if any) for `entity`'s value in component
    /// `comp_id`, without needing to know the concrete type.
    pub fn destroy_component(&mut self, comp_id: usize, entity: Entity) {
        self.stores[comp_id].destroy_entity(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut table = ComponentTable::new();
        let pos: Component<(f32, f32)> = table.define(None, None).unwrap();
        let e = Entity::from_index(3);
        table.store_mut(pos).insert(e, (1.0, 2.0));
        assert_eq!(table.store(pos).get(e), Some(&(1.0, 2.0)));
        assert_eq!(table.store_mut(pos).remove(e), Some((1.0, 2.0)));
        assert_eq!(table.store(pos).get(e), None);
    }

    #[test]
    fn ctor_runs_on_insert_dtor_runs_on_remove() {
        let ctor_calls = Rc::new(Cell::new(0));
        let dtor_calls = Rc::new(Cell::new(0));
        let ctor_calls2 = ctor_calls.clone();
        let dtor_calls2 = dtor_calls.clone();

        let mut table = ComponentTable::new();
        let hp: Component<i32> = table
            .define(
                Some(Box::new(move |_v: &mut i32, _e: Entity| {
                    ctor_calls2.set(ctor_calls2.get() + 1);
                })),
                Some(Box::new(move |_v: &mut i32, _e: Entity| {
                    dtor_calls2.set(dtor_calls2.get() + 1);
                })),
            )
            .unwrap();

        let e = Entity::from_index(1);
        table.store_mut(hp).insert(e, 100);
        assert_eq!(ctor_calls.get(), 1);
        table.store_mut(hp).remove(e);
        assert_eq!(dtor_calls.get(), 1);
    }

    #[test]
    fn too_many_components_is_recoverable() {
        let mut table = ComponentTable::new();
        for _ in 0..MAX_COMPONENTS {
            table.define::<u8>(None, None).unwrap();
        }
        assert_eq!(
            table.define::<u8>(None, None),
            Err(EcsError::TooManyComponents(MAX_COMPONENTS))
        );
    }
}
