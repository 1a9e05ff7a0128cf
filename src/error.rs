//! Recoverable error conditions.
//!
//! Most precondition violations in this crate are programmer errors and are
//! reported with `debug_assert!`/`panic!` — debug builds catch the mistake,
//! release builds trust the caller, exactly like the reference contract this
//! ECS follows. [`EcsError`] exists only for the couple of cases a caller
//! might reasonably want to recover from instead of crashing (running out of
//! component or system slots), mirroring the `get`/`try_get` split
//! `bones_ecs` uses throughout its own `ComponentStores`.

use thiserror::Error;

/// Errors returned by the `try_*` entry points of [`crate::World`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EcsError {
    /// `define_component` was called after `MAX_COMPONENTS` components were already defined.
    #[error("component table is full (MAX_COMPONENTS = {0})")]
    TooManyComponents(usize),
    /// `define_system` was called after `MAX_SYSTEMS` systems were already defined.
    #[error("system table is full (MAX_SYSTEMS = {0})")]
    TooManySystems(usize),
}
