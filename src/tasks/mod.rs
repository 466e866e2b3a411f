//! Background Tasks Module
//!
//! Contains the background work that runs alongside the library's
//! primitives.
//!
//! # Tasks
//! - Eviction sweeper: removes stale timed-cache entries at a fixed rate

mod sweeper;

pub(crate) use sweeper::{spawn_sweeper, ShutdownSignal};
