//! # Runner factory (`Spawn`, `SpawnFn`)
//!
//! The pool never constructs runners itself; it calls a caller-supplied
//! factory on every scale-up. [`SpawnFn`] wraps a closure
//! `F: Fn() -> Fut`, producing a fresh instance per call, so most callers
//! never implement [`Spawn`] by hand.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use taskpool::{Runner, SpawnFn, SpawnRef, TaskError};
//!
//! struct Conn;
//!
//! #[async_trait]
//! impl Runner for Conn {
//!     async fn quit(&self) -> Result<(), TaskError> {
//!         Ok(())
//!     }
//! }
//!
//! let factory: SpawnRef<Conn> = SpawnFn::arc(|| async { Ok(Conn) });
//! # let _ = factory;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;

/// Shared handle to a runner factory.
///
/// Type alias for `Arc<dyn Spawn<R>>`, used to hand the factory to a
/// [`ScalingPool`](crate::ScalingPool).
pub type SpawnRef<R> = Arc<dyn Spawn<R>>;

/// Factory for pooled runner instances.
///
/// Invoked by the pool on every scale-up. A failure is reported as a pool
/// `Error` event and the pool does not grow.
#[async_trait]
pub trait Spawn<R>: Send + Sync + 'static {
    /// Creates one new runner instance.
    async fn spawn(&self) -> Result<R, TaskError>;
}

/// Function-backed factory implementation.
///
/// Wraps a closure that *creates* a new instance per call.
pub struct SpawnFn<F> {
    f: F,
}

impl<F> SpawnFn<F> {
    /// Creates a new function-backed factory.
    ///
    /// Prefer [`SpawnFn::arc`] when you immediately need a [`SpawnRef`].
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the factory and returns it as a shared handle.
    pub fn arc<R>(f: F) -> SpawnRef<R>
    where
        Self: Spawn<R>,
    {
        Arc::new(Self::new(f))
    }
}

#[async_trait]
impl<F, Fut, R> Spawn<R> for SpawnFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<R, TaskError>> + Send + 'static,
    R: Send + 'static,
{
    async fn spawn(&self) -> Result<R, TaskError> {
        (self.f)().await
    }
}
