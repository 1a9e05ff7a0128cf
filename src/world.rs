//! The public API surface: [`World`] wires the entity table, component
//! stores, and system table together and is the only type most callers ever
//! touch directly.

use crate::component::{Component, ComponentTable, Ctor, Dtor};
use crate::entity::{Entity, EntityTable};
use crate::error::EcsError;
use crate::id_stack::IdStack;
use crate::system::{
    AddCb, AnySystemCallbacks, RemoveCb, System, SystemCallbacks, SystemFn, SystemMeta,
    MAX_SYSTEMS,
};

/// A complete, in-process ECS instance.
///
/// `World` is intentionally `!Sync`-by-convention (nothing here is behind a
/// lock): dispatch is single-threaded, and all mutation — entity creation,
/// component add/remove, and system definition — happens through `&mut
/// self`. See `DESIGN.md` for why this crate doesn't chase a multithreaded
/// dispatcher the way a full game engine's ECS eventually does.
pub struct World {
    entities: EntityTable,
    components: ComponentTable,
    system_meta: Vec<SystemMeta>,
    system_callbacks: Vec<Option<Box<dyn AnySystemCallbacks>>>,
    destroy_queue: IdStack<Entity>,
    remove_queue: IdStack<(Entity, u32)>,
    pending_removes: Vec<(usize, Entity)>,
    matching_started: bool,
}

impl World {
    /// Create a world whose entity table starts pre-sized for
    /// `initial_entity_count` live entities (it grows by doubling past
    /// that, same as everything else here).
    pub fn new(initial_entity_count: usize) -> Self {
        Self {
            entities: EntityTable::new(initial_entity_count),
            components: ComponentTable::new(),
            system_meta: Vec::new(),
            system_callbacks: Vec::new(),
            destroy_queue: IdStack::new(),
            remove_queue: IdStack::new(),
            pending_removes: Vec::new(),
            matching_started: false,
        }
    }

    /// Run every live entity's destructors and reinitialize the entity
    /// table and every system's member set, without forgetting component or
    /// system *definitions*. Equivalent in effect to dropping and recreating
    /// the world, minus re-registering components and systems.
    pub fn reset(&mut self) {
        self.destroy_all_active_entities();
        self.entities.reset();
        self.destroy_queue.clear();
        self.remove_queue.clear();
        self.pending_removes.clear();
        for meta in &mut self.system_meta {
            meta.members.clear();
        }
        self.matching_started = false;
    }

    fn destroy_all_active_entities(&mut self) {
        for id in 1..self.entities.capacity() as u32 {
            let e = Entity::from_index(id);
            if self.entities.is_active(e) {
                self.destroy_components_of(e);
            }
        }
    }

    fn destroy_components_of(&mut self, e: Entity) {
        let bits = self.entities.comp_bits(e);
        for comp_id in 0..self.components.len() {
            if bits.test(comp_id) {
                self.components.destroy_component(comp_id, e);
            }
        }
    }

    // ---- entities ----------------------------------------------------

    /// Create a new entity. Recycled ids are reused lowest-first.
    pub fn create(&mut self) -> Entity {
        self.entities.create()
    }

    /// True if `e` has not been destroyed (directly or via the deferred
    /// queue) since it was created.
    pub fn is_active(&self, e: Entity) -> bool {
        self.entities.is_active(e)
    }

    /// True if `e` is active and has not been queued for destruction. Use
    /// before reading or writing its components; an entity that's been
    /// `queue_destroy`d is still active but no longer ready.
    pub fn is_ready(&self, e: Entity) -> bool {
        self.entities.is_ready(e)
    }

    /// Destroy `e` immediately: run destructors for all of its components,
    /// remove it from every system's member set, and return its id to the
    /// free-list. Calling this on an inactive entity is a no-op.
    pub fn destroy(&mut self, e: Entity) {
        if !self.entities.is_active(e) {
            return;
        }
        self.remove_entity_from_all_systems(e);
        self.destroy_components_of(e);
        self.entities.recycle(e);
    }

    /// Queue `e` for destruction at the end of the current system run.
    /// Removes `e` from every system's member set immediately (so later
    /// systems in the same run no longer see it) but defers the destructor
    /// calls and id recycling until `run_system`/`run_systems` finishes.
    /// Safe to call while iterating a system's own member list, including
    /// the currently-running system's: its `remove_cb` still fires for `e`,
    /// just deferred to right after its callback slot is restored (see
    /// `fire_remove`/`drain_pending_removes`), rather than dropped.
    /// A no-op if `e` is already inactive or already queued.
    pub fn queue_destroy(&mut self, e: Entity) {
        if !self.entities.is_active(e) || !self.entities.is_ready(e) {
            return;
        }
        self.entities.mark_not_ready(e);
        self.remove_entity_from_all_systems(e);
        self.destroy_queue.push(e);
    }

    // ---- components ----------------------------------------------------

    /// Define a new component type with no constructor/destructor hooks.
    /// Panics if `MAX_COMPONENTS` components are already defined.
    pub fn define_component<T: 'static>(&mut self) -> Component<T> {
        self.try_define_component(None, None)
            .expect("component table is full")
    }

    /// Define a new component type with constructor/destructor hooks.
    /// Panics if `MAX_COMPONENTS` components are already defined.
    pub fn define_component_with_hooks<T: 'static>(
        &mut self,
        ctor: Option<Ctor<T>>,
        dtor: Option<Dtor<T>>,
    ) -> Component<T> {
        self.try_define_component(ctor, dtor)
            .expect("component table is full")
    }

    /// Fallible form of `define_component`/`define_component_with_hooks`.
    pub fn try_define_component<T: 'static>(
        &mut self,
        ctor: Option<Ctor<T>>,
        dtor: Option<Dtor<T>>,
    ) -> Result<Component<T>, EcsError> {
        self.components.define(ctor, dtor)
    }

    /// True if `e` currently has a value stored for `c`.
    pub fn has<T: 'static>(&self, e: Entity, c: Component<T>) -> bool {
        debug_assert!(self.entities.is_ready(e), "entity is not ready");
        self.entities.comp_bits(e).test(c.id() as usize)
    }

    /// Borrow `e`'s value for `c`, or `None` if it doesn't have one.
    pub fn get<T: 'static>(&self, e: Entity, c: Component<T>) -> Option<&T> {
        debug_assert!(self.entities.is_ready(e), "entity is not ready");
        if !self.entities.comp_bits(e).test(c.id() as usize) {
            return None;
        }
        self.components.store(c).get(e)
    }

    /// Mutably borrow `e`'s value for `c`, or `None` if it doesn't have one.
    pub fn get_mut<T: 'static>(&mut self, e: Entity, c: Component<T>) -> Option<&mut T> {
        debug_assert!(self.entities.is_ready(e), "entity is not ready");
        if !self.entities.comp_bits(e).test(c.id() as usize) {
            return None;
        }
        self.components.store_mut(c).get_mut(e)
    }

    /// Attach `value` as `e`'s component `c`, overwriting any existing
    /// value, running the constructor hook if one is registered, and
    /// updating every system's membership. Returns a mutable borrow of the
    /// freshly-stored value.
    pub fn add<T: 'static>(&mut self, e: Entity, c: Component<T>, value: T) -> &mut T {
        debug_assert!(self.entities.is_ready(e), "entity is not ready");
        self.matching_started = true;
        self.components.store_mut(c).insert(e, value);
        self.entities.set_bit(e, c.id() as usize, true);
        self.sync_membership_full(e);
        self.components
            .store_mut(c)
            .get_mut(e)
            .expect("value was just inserted")
    }

    /// Remove `e`'s value for `c` immediately, updating every system that
    /// cares about `c`'s membership first, then running the destructor hook
    /// and returning the removed value. `None` if `e` didn't have `c`.
    pub fn remove<T: 'static>(&mut self, e: Entity, c: Component<T>) -> Option<T> {
        debug_assert!(self.entities.is_ready(e), "entity is not ready");
        let comp_id = c.id() as usize;
        if !self.entities.comp_bits(e).test(comp_id) {
            return None;
        }
        self.sync_membership_for_component(e, comp_id);
        self.entities.set_bit(e, comp_id, false);
        self.components.store_mut(c).remove(e)
    }

    /// Queue removal of `e`'s component `c` at the end of the current
    /// system run. Safe to call while iterating a system's own member list.
    pub fn queue_remove<T: 'static>(&mut self, e: Entity, c: Component<T>) {
        self.remove_queue.push((e, c.id()));
    }

    fn remove_by_id(&mut self, e: Entity, comp_id: usize) {
        if !self.entities.is_active(e) || !self.entities.comp_bits(e).test(comp_id) {
            return;
        }
        self.sync_membership_for_component(e, comp_id);
        self.entities.set_bit(e, comp_id, false);
        self.components.destroy_component(comp_id, e);
    }

    fn flush_deferred(&mut self) {
        self.drain_pending_removes();
        let to_destroy: Vec<Entity> = self.destroy_queue.drain_fifo().collect();
        for e in to_destroy {
            if self.entities.is_active(e) {
                self.destroy_components_of(e);
                self.entities.recycle(e);
            }
        }
        let to_remove: Vec<(Entity, u32)> = self.remove_queue.drain_fifo().collect();
        for (e, comp_id) in to_remove {
            self.remove_by_id(e, comp_id as usize);
        }
    }

    // ---- system matching ------------------------------------------------

    fn sync_membership_full(&mut self, e: Entity) {
        for id in 0..self.system_meta.len() {
            self.sync_one(id, e);
        }
    }

    /// Re-evaluate membership for every system that references `comp_id`,
    /// as if that bit were already cleared — without actually touching the
    /// entity's real bitset yet. This lets `remove_cb` still observe the
    /// component as present (via `get`/`has`) while membership updates
    /// correctly ahead of the real bit clear and the destructor call.
    fn sync_membership_for_component(&mut self, e: Entity, comp_id: usize) {
        let mut bits_without = self.entities.comp_bits(e);
        bits_without.set(comp_id, false);
        for id in 0..self.system_meta.len() {
            if self.system_meta[id].cares_about(comp_id) {
                self.sync_one_with_bits(id, e, bits_without);
            }
        }
    }

    fn sync_one(&mut self, id: usize, e: Entity) {
        let bits = self.entities.comp_bits(e);
        self.sync_one_with_bits(id, e, bits);
    }

    fn sync_one_with_bits(&mut self, id: usize, e: Entity, bits: crate::bitset::ComponentBits) {
        let matches = self.system_meta[id].matches(&bits);
        let is_member = self.system_meta[id].members.contains(e);
        if matches && !is_member {
            self.system_meta[id].members.insert(e);
            self.fire_add(id, e);
        } else if !matches && is_member {
            self.system_meta[id].members.remove(e);
            self.fire_remove(id, e);
        }
    }

    fn remove_entity_from_all_systems(&mut self, e: Entity) {
        for id in 0..self.system_meta.len() {
            if self.system_meta[id].members.remove(e) {
                self.fire_remove(id, e);
            }
        }
    }

    /// If this system's callbacks aren't currently checked out (i.e. this
    /// isn't a reentrant call into the system that's presently running),
    /// fire its add callback. See `system.rs` module docs for why a
    /// mid-run reentrant add is silently skipped rather than queued.
    fn fire_add(&mut self, id: usize, e: Entity) {
        if let Some(mut cb) = self.system_callbacks[id].take() {
            cb.call_add(self, e);
            self.system_callbacks[id] = Some(cb);
        }
    }

    /// Fire `id`'s remove callback for `e`. If `id`'s callback slot is
    /// currently checked out — `e` left the member set of the system that's
    /// presently running, most commonly because its own callback
    /// `queue_destroy`d one of its members — the call can't happen yet, so
    /// it's queued in `pending_removes` and fired from `drain_pending_removes`
    /// once `run_system_by_id` restores the slot, still ahead of any
    /// destructor call the same flush performs.
    fn fire_remove(&mut self, id: usize, e: Entity) {
        if let Some(mut cb) = self.system_callbacks[id].take() {
            cb.call_remove(self, e);
            self.system_callbacks[id] = Some(cb);
        } else {
            self.pending_removes.push((id, e));
        }
    }

    fn drain_pending_removes(&mut self) {
        let pending = std::mem::take(&mut self.pending_removes);
        for (id, e) in pending {
            self.fire_remove(id, e);
        }
    }

    // ---- systems ---------------------------------------------------------

    /// Define a new system. `mask` is its category mask: 0 means "always
    /// run"; a nonzero mask only runs when it shares a bit with the mask
    /// passed to `run_system`/`run_systems`. Panics if `MAX_SYSTEMS` systems
    /// are already defined.
    pub fn define_system<U: 'static>(
        &mut self,
        mask: u32,
        system_cb: SystemFn<U>,
        add_cb: Option<AddCb<U>>,
        remove_cb: Option<RemoveCb<U>>,
        udata: U,
    ) -> System<U> {
        self.try_define_system(mask, system_cb, add_cb, remove_cb, udata)
            .expect("system table is full")
    }

    /// Fallible form of `define_system`.
    pub fn try_define_system<U: 'static>(
        &mut self,
        mask: u32,
        system_cb: SystemFn<U>,
        add_cb: Option<AddCb<U>>,
        remove_cb: Option<RemoveCb<U>>,
        udata: U,
    ) -> Result<System<U>, EcsError> {
        if self.system_meta.len() >= MAX_SYSTEMS {
            return Err(EcsError::TooManySystems(MAX_SYSTEMS));
        }
        let id = self.system_meta.len() as u32;
        self.system_meta.push(SystemMeta::new(mask));
        self.system_callbacks.push(Some(Box::new(SystemCallbacks {
            system_cb,
            add_cb,
            remove_cb,
            udata,
        })));
        Ok(System::new(id))
    }

    /// Add `c` to `sys`'s require signature. Must be called immediately
    /// after `define_system`, before any component has ever been added to
    /// any entity in this world (debug-asserted).
    pub fn require_component<U: 'static, T: 'static>(&mut self, sys: System<U>, comp: Component<T>) {
        debug_assert!(
            !self.matching_started,
            "require_component called after matching has begun"
        );
        self.system_meta[sys.id() as usize]
            .require_bits
            .set(comp.id() as usize, true);
    }

    /// Add `c` to `sys`'s exclude signature. Same timing constraint as
    /// `require_component`.
    pub fn exclude_component<U: 'static, T: 'static>(&mut self, sys: System<U>, comp: Component<T>) {
        debug_assert!(
            !self.matching_started,
            "exclude_component called after matching has begun"
        );
        self.system_meta[sys.id() as usize]
            .exclude_bits
            .set(comp.id() as usize, true);
    }

    pub fn enable_system<U: 'static>(&mut self, sys: System<U>) {
        self.system_meta[sys.id() as usize].active = true;
    }

    pub fn disable_system<U: 'static>(&mut self, sys: System<U>) {
        self.system_meta[sys.id() as usize].active = false;
    }

    pub fn set_system_mask<U: 'static>(&mut self, sys: System<U>, mask: u32) {
        self.system_meta[sys.id() as usize].mask = mask;
    }

    pub fn get_system_mask<U: 'static>(&self, sys: System<U>) -> u32 {
        self.system_meta[sys.id() as usize].mask
    }

    /// The number of entities currently matching `sys`'s signature.
    pub fn get_system_entity_count<U: 'static>(&self, sys: System<U>) -> usize {
        self.system_meta[sys.id() as usize].members.len()
    }

    pub fn get_system_udata<U: 'static>(&self, sys: System<U>) -> &U {
        &self.downcast_callbacks(sys.id()).udata
    }

    pub fn set_system_udata<U: 'static>(&mut self, sys: System<U>, udata: U) {
        self.downcast_callbacks_mut(sys.id()).udata = udata;
    }

    /// Replace `sys`'s callbacks in place, keeping its current user data.
    pub fn set_system_callbacks<U: 'static>(
        &mut self,
        sys: System<U>,
        system_cb: SystemFn<U>,
        add_cb: Option<AddCb<U>>,
        remove_cb: Option<RemoveCb<U>>,
    ) {
        let cb = self.downcast_callbacks_mut(sys.id());
        cb.system_cb = system_cb;
        cb.add_cb = add_cb;
        cb.remove_cb = remove_cb;
    }

    fn downcast_callbacks<U: 'static>(&self, id: u32) -> &SystemCallbacks<U> {
        self.system_callbacks[id as usize]
            .as_ref()
            .expect("system callbacks missing (reentrant call into its own run?)")
            .as_any()
            .downcast_ref()
            .expect("system handle does not match its definition")
    }

    fn downcast_callbacks_mut<U: 'static>(&mut self, id: u32) -> &mut SystemCallbacks<U> {
        self.system_callbacks[id as usize]
            .as_mut()
            .expect("system callbacks missing (reentrant call into its own run?)")
            .as_any_mut()
            .downcast_mut()
            .expect("system handle does not match its definition")
    }

    /// Run a single system if it's active and its mask matches `run_mask`
    /// (or its mask is 0, meaning "always run"). Flushes the deferred
    /// destroy/remove queues once the callback returns. Returns the
    /// callback's status code, or 0 if the system didn't run.
    pub fn run_system<U: 'static>(&mut self, sys: System<U>, run_mask: u32) -> i32 {
        self.run_system_by_id(sys.id() as usize, run_mask)
    }

    /// Run every defined system in definition order, short-circuiting and
    /// returning as soon as one returns a nonzero code.
    pub fn run_systems(&mut self, run_mask: u32) -> i32 {
        for id in 0..self.system_meta.len() {
            let code = self.run_system_by_id(id, run_mask);
            if code != 0 {
                return code;
            }
        }
        0
    }

    fn run_system_by_id(&mut self, id: usize, run_mask: u32) -> i32 {
        let meta = &self.system_meta[id];
        if !meta.active {
            return 0;
        }
        if meta.mask != 0 && (meta.mask & run_mask) == 0 {
            return 0;
        }
        let entities: Vec<Entity> = meta.members.as_slice().to_vec();
        let mut cb = self.system_callbacks[id]
            .take()
            .expect("system callbacks missing (reentrant run_system?)");
        let code = cb.call_system(self, &entities);
        self.system_callbacks[id] = Some(cb);
        self.flush_deferred();
        code
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Drop for World {
    fn drop(&mut self) {
        self.destroy_all_active_entities();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn create_destroy_lifecycle() {
        let mut world = World::new(4);
        let e = world.create();
        assert!(world.is_active(e));
        assert!(world.is_ready(e));
        world.destroy(e);
        assert!(!world.is_active(e));
    }

    #[test]
    fn add_and_remove_tracks_bits_and_returns_value() {
        let mut world = World::new(4);
        let pos = world.define_component::<(i32, i32)>();
        let e = world.create();
        assert!(!world.has(e, pos));
        world.add(e, pos, (3, 4));
        assert!(world.has(e, pos));
        assert_eq!(world.get(e, pos), Some(&(3, 4)));
        assert_eq!(world.remove(e, pos), Some((3, 4)));
        assert!(!world.has(e, pos));
        assert_eq!(world.remove(e, pos), None);
    }

    #[test]
    fn system_gains_and_loses_members_as_components_change() {
        let mut world = World::new(4);
        let pos = world.define_component::<i32>();
        let vel = world.define_component::<i32>();
        let sys = world.define_system::<()>(
            0,
            Box::new(|_w, _entities, _u| 0),
            None,
            None,
            (),
        );
        world.require_component(sys, pos);
        world.require_component(sys, vel);

        let e1 = world.create();
        let e2 = world.create();
        world.add(e1, pos, 1);
        assert_eq!(world.get_system_entity_count(sys), 0);
        world.add(e1, vel, 1);
        assert_eq!(world.get_system_entity_count(sys), 1);
        world.add(e2, pos, 1);
        world.add(e2, vel, 1);
        assert_eq!(world.get_system_entity_count(sys), 2);

        world.remove(e1, vel);
        assert_eq!(world.get_system_entity_count(sys), 1);
    }

    #[test]
    fn exclude_component_keeps_entity_out() {
        let mut world = World::new(4);
        let pos = world.define_component::<i32>();
        let dead = world.define_component::<()>();
        let sys = world.define_system::<()>(0, Box::new(|_w, _e, _u| 0), None, None, ());
        world.require_component(sys, pos);
        world.exclude_component(sys, dead);

        let e = world.create();
        world.add(e, pos, 1);
        assert_eq!(world.get_system_entity_count(sys), 1);
        world.add(e, dead, ());
        assert_eq!(world.get_system_entity_count(sys), 0);
        world.remove(e, dead);
        assert_eq!(world.get_system_entity_count(sys), 1);
    }

    #[test]
    fn queue_destroy_defers_recycling_until_flush() {
        let mut world = World::new(4);
        let pos = world.define_component::<i32>();
        let sys = world.define_system::<Vec<Entity>>(
            0,
            Box::new(|w, entities, seen| {
                for &e in entities {
                    seen.push(e);
                    w.queue_destroy(e);
                }
                0
            }),
            None,
            None,
            Vec::new(),
        );
        world.require_component(sys, pos);

        let mut created = Vec::new();
        for _ in 0..8192 {
            let e = world.create();
            world.add(e, pos, 1);
            created.push(e);
        }
        assert_eq!(world.get_system_entity_count(sys), 8192);
        world.run_system(sys, 0);
        assert_eq!(world.get_system_entity_count(sys), 0);
        for e in created {
            assert!(!world.is_active(e));
        }
    }

    #[test]
    fn queue_destroy_fires_remove_cb_for_running_system() {
        let mut world = World::new(4);
        let pos = world.define_component::<i32>();
        let removed = Rc::new(Cell::new(0));
        let removed2 = removed.clone();
        let sys = world.define_system::<()>(
            0,
            Box::new(|w, entities, _u| {
                let entities = entities.to_vec();
                for e in entities {
                    w.queue_destroy(e);
                }
                0
            }),
            None,
            Some(Box::new(move |_w, _e, _u| {
                removed2.set(removed2.get() + 1);
            })),
            (),
        );
        world.require_component(sys, pos);

        for _ in 0..5 {
            let e = world.create();
            world.add(e, pos, 1);
        }
        assert_eq!(world.get_system_entity_count(sys), 5);
        world.run_system(sys, 0);
        assert_eq!(
            removed.get(),
            5,
            "remove_cb must fire for every member the system queue_destroys from its own callback"
        );
        assert_eq!(world.get_system_entity_count(sys), 0);
    }

    #[test]
    fn destructor_fires_on_reset() {
        let mut world = World::new(4);
        let counter = Rc::new(Cell::new(0));
        let counter2 = counter.clone();
        let hp = world.define_component_with_hooks::<i32>(
            None,
            Some(Box::new(move |_v: &mut i32, _e: Entity| {
                counter2.set(counter2.get() + 1);
            })),
        );
        for _ in 0..100 {
            let e = world.create();
            world.add(e, hp, 10);
        }
        world.reset();
        assert_eq!(counter.get(), 100);
    }

    #[test]
    fn category_mask_zero_always_runs() {
        let mut world = World::new(4);
        let calls = Rc::new(Cell::new(0));
        let calls_s1 = calls.clone();
        let calls_s3 = calls.clone();

        let s1 = world.define_system::<()>(
            0b01,
            Box::new(move |_w, _e, _u| {
                calls_s1.set(calls_s1.get() | 0b01);
                0
            }),
            None,
            None,
            (),
        );
        let s3 = world.define_system::<()>(
            0,
            Box::new(move |_w, _e, _u| {
                calls_s3.set(calls_s3.get() | 0b100);
                0
            }),
            None,
            None,
            (),
        );

        calls.set(0);
        world.run_systems(0);
        assert_eq!(calls.get() & 0b01, 0, "mask 0b01 system should not run for run_mask 0");
        assert_eq!(calls.get() & 0b100, 0b100, "mask 0 system always runs");

        calls.set(0);
        world.run_system(s1, 0b10);
        assert_eq!(calls.get() & 0b01, 0);

        calls.set(0);
        world.run_system(s1, 0b01);
        assert_eq!(calls.get() & 0b01, 0b01);

        let _ = s3;
    }

    #[test]
    fn run_systems_short_circuits_on_nonzero_code() {
        let mut world = World::new(4);
        let ran_second = Rc::new(Cell::new(false));
        let ran_second2 = ran_second.clone();
        world.define_system::<()>(0, Box::new(|_w, _e, _u| 42), None, None, ());
        world.define_system::<()>(
            0,
            Box::new(move |_w, _e, _u| {
                ran_second2.set(true);
                0
            }),
            None,
            None,
            (),
        );
        let code = world.run_systems(0);
        assert_eq!(code, 42);
        assert!(!ran_second.get());
    }
}
