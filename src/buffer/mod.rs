//! Buffers: the bounded async FIFO and its polling-fed variant.
//!
//! ## Contents
//! - [`AsyncBuffer`] size-bounded FIFO with suspension on empty pop / full
//!   push and drain-on-quit shutdown.
//! - [`PollingBuffer`] composition of an `AsyncBuffer` with a
//!   [`ScalingPool`](crate::ScalingPool) of fetch-capable runners; poll
//!   outcomes drive both production and pool sizing.
//!
//! The polling variant *contains* its buffer and pool and forwards the
//! buffer surface; it does not extend either. The pool knows nothing about
//! the buffer — the dependency is one-directional.

mod polling;
mod queue;

pub use polling::PollingBuffer;
pub use queue::AsyncBuffer;
