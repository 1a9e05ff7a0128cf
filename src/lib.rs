//! A small, deliberate sparse-set ECS core.
//!
//! An entity is a bare recycled id. A component is a dense, directly-indexed
//! store of one Rust type, attached to entities one at a time through
//! [`World::add`]/[`World::remove`]. A system is a callback paired with a
//! require/exclude signature over component bits; [`World`] keeps each
//! system's matched-entity set up to date incrementally as components are
//! added and removed, rather than re-scanning every entity on every run.
//!
//! ```
//! use sparq_ecs::World;
//!
//! let mut world = World::new(64);
//! let position = world.define_component::<(f32, f32)>();
//! let velocity = world.define_component::<(f32, f32)>();
//!
//! let movement = world.define_system::<()>(
//!     0,
//!     Box::new(|world, entities, _udata| {
//!         for &e in entities {
//!             let (vx, vy) = *world.get(e, velocity).unwrap();
//!             let (x, y) = world.get_mut(e, position).unwrap();
//!             *x += vx;
//!             *y += vy;
//!         }
//!         0
//!     }),
//!     None,
//!     None,
//!     (),
//! );
//! world.require_component(movement, position);
//! world.require_component(movement, velocity);
//!
//! let e = world.create();
//! world.add(e, position, (0.0, 0.0));
//! world.add(e, velocity, (1.0, 0.5));
//! world.run_system(movement, 0);
//! assert_eq!(world.get(e, position), Some(&(1.0, 0.5)));
//! ```

mod bitset;
mod component;
mod entity;
mod error;
mod id_stack;
mod sparse_set;
mod system;
mod world;

pub use bitset::{ComponentBits, MAX_COMPONENTS};
pub use component::{Component, Ctor, Dtor};
pub use entity::Entity;
pub use error::EcsError;
pub use system::{AddCb, RemoveCb, System, SystemFn, MAX_SYSTEMS};
pub use world::World;

/// Re-exports the types most callers need for defining components and
/// systems, to pull in with a single `use sparq_ecs::prelude::*;`.
pub mod prelude {
    pub use crate::{Component, Ctor, Dtor, EcsError, Entity, System, World};
}
