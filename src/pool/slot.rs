//! # Slot: pool-internal wrapper around one runner instance.
//!
//! Tracks the claim state and terminal flag of a single pooled instance.
//!
//! ## Rules
//! - `claimed_at` is `Some` **iff** the instance is currently claimed; the
//!   timestamp feeds utilization metering and is refreshed on every tick.
//! - `quitting = true` marks the slot terminal: it re-enters rotation never
//!   (no waiter hand-off, no `Available` on release) and is detached by the
//!   next scale-down.

use std::sync::Arc;
use std::time::Instant;

/// One pooled instance plus its claim bookkeeping.
pub(crate) struct Slot<R> {
    /// The instance; shared with the current claim holder, if any.
    pub(crate) instance: Arc<R>,
    /// Set while claimed; refreshed by the utilization tick.
    pub(crate) claimed_at: Option<Instant>,
    /// Terminal flag set by `kill_runner`; the slot is awaiting removal.
    pub(crate) quitting: bool,
}

impl<R> Slot<R> {
    /// Wraps a freshly created instance (unclaimed, live).
    pub(crate) fn new(instance: Arc<R>) -> Self {
        Self {
            instance,
            claimed_at: None,
            quitting: false,
        }
    }

    /// True when the slot can be handed to a claimer.
    pub(crate) fn is_available(&self) -> bool {
        self.claimed_at.is_none() && !self.quitting
    }
}
