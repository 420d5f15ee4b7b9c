//! # Runner abstractions and factories.
//!
//! This module provides the pooled-worker types:
//! - [`Runner`] - trait for pooled instances that can be shut down
//! - [`PollingRunner`] - runners that can also fetch batches of items
//! - [`Fetch`] - typed outcome of a poll (`Timeout` vs `Batch`)
//! - [`Spawn`] - factory trait invoked by the pool on scale-up
//! - [`SpawnFn`] - closure-backed factory implementation
//! - [`SpawnRef`] - shared reference to a factory (`Arc<dyn Spawn<R>>`)

mod runner;
mod spawner;

pub use runner::{Fetch, PollingRunner, Runner};
pub use spawner::{Spawn, SpawnFn, SpawnRef};
