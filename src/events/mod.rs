//! Runtime events: typed notifications and the broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to notifications emitted by the pool and the buffers.
//!
//! ## Contents
//! - [`Event`], [`PoolEventKind`], [`BufferEventKind`] typed notifications
//! - [`Bus`] thin generic wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `ScalingPool` (available/released/scale/usage/error),
//!   `AsyncBuffer` (push/pop/error), `PollingBuffer` (scale/error via its
//!   buffer bus).
//! - **Consumers**: `PollingBuffer`'s poll driver (pool `Available`), the
//!   pool's own scale-down/quit drains (pool `Released`), and any user
//!   subscriber (e.g. the feature-gated `LogSubscriber`).
//!
//! Each component owns its own bus; there is no global channel. Payloads are
//! enum variants, not string keys, so emission points are checked by the
//! compiler.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{BufferEvent, BufferEventKind, Event, PoolEvent, PoolEventKind};
