//! Typed notifications emitted by the pool and the buffers.
//!
//! [`Event`] pairs a payload kind with a globally unique sequence number, so
//! notifications can be ordered even when observed through independent
//! broadcast receivers. Kinds are plain enums — [`PoolEventKind`] and
//! [`BufferEventKind`] — with their payloads in the variants.
//!
//! ## Emission points
//!
//! ```text
//! ScalingPool
//!   ├─ Available      slot created or released back into rotation
//!   ├─ Released       claimed instance returned (even when quitting)
//!   ├─ Scale          instance count changed (up, down, or failed attempt)
//!   ├─ Usage          utilization tick result
//!   └─ Error          factory / runner-quit / release misuse
//!
//! AsyncBuffer
//!   ├─ Push           item accepted (len = new length)
//!   ├─ Pop            item handed out (len = new length)
//!   ├─ Scale          republished by PollingBuffer from its pool
//!   └─ Error          republished fetch/push failures
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A runtime notification stamped with a global sequence number.
#[derive(Clone, Debug)]
pub struct Event<K> {
    /// Globally unique, monotonically increasing sequence number.
    /// Used to determine event ordering across async boundaries.
    pub seq: u64,
    /// The typed payload.
    pub kind: K,
}

impl<K> Event<K> {
    /// Wraps a kind with the next sequence number.
    pub fn now(kind: K) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            kind,
        }
    }
}

/// Notifications emitted by [`ScalingPool`](crate::ScalingPool).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum PoolEventKind {
    /// An unclaimed, live instance entered rotation (created or released).
    Available,

    /// A claimed instance was released.
    ///
    /// Emitted even for quitting slots and during pool shutdown; internal
    /// drains (scale-down, quit) key off this.
    Released,

    /// The instance list changed, or a scale attempt finished.
    Scale {
        /// Instance count after the attempt.
        instances: usize,
    },

    /// Result of a utilization tick.
    Usage {
        /// Fraction of claimed wall-time over the last interval, in `[0, 1]`.
        utilization: f64,
        /// Instance count at tick time.
        instances: usize,
    },

    /// A recoverable pool error (factory failure, runner-quit failure,
    /// release misuse).
    Error {
        /// Short stable label (e.g. `factory_failed`).
        label: &'static str,
        /// Human-readable description.
        reason: String,
    },
}

/// Notifications emitted by [`AsyncBuffer`](crate::AsyncBuffer) and
/// republished by [`PollingBuffer`](crate::PollingBuffer).
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum BufferEventKind {
    /// An item was accepted.
    Push {
        /// Buffer length after the push.
        len: usize,
    },

    /// An item was handed to a popper.
    Pop {
        /// Buffer length after the pop.
        len: usize,
    },

    /// The polling pool behind this buffer changed size.
    Scale {
        /// Instance count after the change.
        instances: usize,
    },

    /// A recoverable error observed by the buffer or its poll driver.
    Error {
        /// Short stable label (e.g. `task_failed`).
        label: &'static str,
        /// Human-readable description.
        reason: String,
    },
}

/// A pool notification with its sequence stamp.
pub type PoolEvent = Event<PoolEventKind>;

/// A buffer notification with its sequence stamp.
pub type BufferEvent = Event<BufferEventKind>;
