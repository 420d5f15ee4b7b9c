//! # Runner traits for pooled worker instances.
//!
//! A [`Runner`] is a caller-supplied worker object owned by a
//! [`ScalingPool`](crate::ScalingPool) between creation (via
//! [`Spawn`](crate::runners::Spawn)) and destruction (via [`Runner::quit`]).
//! A [`PollingRunner`] additionally knows how to fetch batches of items,
//! which is what drives a [`PollingBuffer`](crate::PollingBuffer).
//!
//! ## Rules
//! - The pool claims runners exclusively: at most one holder at a time.
//! - `quit` is called exactly once, on scale-down or pool shutdown. After it
//!   resolves the pool drops its reference.
//! - `fetch` distinguishes a poll timeout ([`Fetch::Timeout`]) from an empty
//!   batch (`Fetch::Batch(vec![])`): both leave the buffer untouched and
//!   count against the runner for reaping, but an empty batch is a clean
//!   round-trip, not a stall.

use async_trait::async_trait;

use crate::error::TaskError;

/// Outcome of a single poll on a [`PollingRunner`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fetch<T> {
    /// The poll timed out without reaching the backing source.
    Timeout,
    /// A batch of items (possibly empty) returned by the source.
    Batch(Vec<T>),
}

impl<T> Fetch<T> {
    /// Wraps a single item as a one-element batch.
    pub fn one(item: T) -> Self {
        Fetch::Batch(vec![item])
    }

    /// Returns true for [`Fetch::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Fetch::Timeout)
    }

    /// Returns true for timeouts and empty batches — the outcomes that make
    /// the polling buffer consider reaping the runner.
    pub fn is_idle(&self) -> bool {
        match self {
            Fetch::Timeout => true,
            Fetch::Batch(items) => items.is_empty(),
        }
    }
}

/// A pooled worker instance.
///
/// Implementations typically wrap a connection or a session to some backing
/// service. The pool creates them through a [`Spawn`](crate::runners::Spawn)
/// factory and destroys them with [`quit`](Runner::quit).
#[async_trait]
pub trait Runner: Send + Sync + 'static {
    /// Shuts the instance down, releasing any held resources.
    ///
    /// Failures are reported as pool `Error` events; scale-down proceeds
    /// regardless.
    async fn quit(&self) -> Result<(), TaskError>;
}

/// A [`Runner`] that can fetch batches of items from its backing source.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use taskpool::{Fetch, PollingRunner, Runner, TaskError};
///
/// struct QueueTail;
///
/// #[async_trait]
/// impl Runner for QueueTail {
///     async fn quit(&self) -> Result<(), TaskError> {
///         Ok(())
///     }
/// }
///
/// #[async_trait]
/// impl PollingRunner for QueueTail {
///     type Item = u32;
///
///     async fn fetch(&self) -> Result<Fetch<u32>, TaskError> {
///         // A blocking pop against a remote queue would live here.
///         Ok(Fetch::Timeout)
///     }
/// }
/// ```
#[async_trait]
pub trait PollingRunner: Runner {
    /// The item type this runner produces.
    type Item: Send + 'static;

    /// Performs one blocking poll against the backing source.
    ///
    /// ### Return contract
    /// - `Ok(Fetch::Timeout)` — the poll expired; nothing to deliver.
    /// - `Ok(Fetch::Batch(items))` — zero or more items to buffer.
    /// - `Err(e)` — the poll itself failed; reported as a buffer `Error`
    ///   event and treated like a timeout for scaling purposes.
    async fn fetch(&self) -> Result<Fetch<Self::Item>, TaskError>;
}
