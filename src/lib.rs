//! # taskpool
//!
//! **Taskpool** is a concurrency toolkit for bounded-parallel task
//! execution over lazy or asynchronous inputs.
//!
//! It replaces ad-hoc "spawn N tasks and join them" patterns with a runtime
//! that keeps exactly K jobs in flight, preserves every error without
//! losing the rest, supports cooperative abort, and composes with a
//! backpressured queue and an auto-scaling runner pool so polling-style
//! ingestion can drive the executor.
//!
//! ## Features
//!
//! | Area          | Description                                                      | Key types / traits                         |
//! |---------------|------------------------------------------------------------------|--------------------------------------------|
//! | **Executor**  | Bounded-parallel runs over lazy sources with error policies.     | [`Executor`], [`execute`], [`RunHandle`]   |
//! | **Sources**   | Eager, streamed, deferred, produced, or init-carrying inputs.    | [`Source`]                                 |
//! | **Buffering** | Bounded FIFO with async push/pop and drain-on-quit shutdown.     | [`AsyncBuffer`]                            |
//! | **Pooling**   | Elastic claim/release pool scaled from observed utilization.     | [`ScalingPool`], [`Runner`], [`Spawn`]     |
//! | **Polling**   | Pool-fed buffer: fetch loops with backpressure and reaping.      | [`PollingBuffer`], [`PollingRunner`]       |
//! | **Errors**    | Typed errors per origin; runs fail with their full report.       | [`TaskError`], [`RunError`]                |
//! | **Events**    | Typed broadcast notifications per component.                     | [`events::Bus`], [`PoolEvent`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogSubscriber`] _(demo/reference only)_.
//!
//! ```no_run
//! use taskpool::{execute, ExecutorConfig, Source, TaskError};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handle = execute(
//!         Source::<u32>::iter(1..=10),
//!         |n, _| async move {
//!             // do work...
//!             Ok::<_, TaskError>(n * n)
//!         },
//!         ExecutorConfig {
//!             parallel: 4,
//!             ..Default::default()
//!         },
//!     );
//!
//!     let report = handle.await?;
//!     assert_eq!(report.fulfilled, 10);
//!     Ok(())
//! }
//! ```
//!
//! ---

mod buffer;
mod config;
mod core;
mod error;
mod pool;
mod runners;

pub mod events;

#[cfg(feature = "logging")]
mod log;

// ---- Public re-exports ----

pub use buffer::{AsyncBuffer, PollingBuffer};
pub use config::{BufferConfig, ExecutorConfig, PoolConfig};
pub use core::{execute, execute_with_teardown, Executor, RunHandle, RunOutcome, RunReport, Source};
pub use error::{BufferError, PoolError, RunError, TaskError};
pub use events::{BufferEvent, BufferEventKind, PoolEvent, PoolEventKind};
pub use pool::ScalingPool;
pub use runners::{Fetch, PollingRunner, Runner, Spawn, SpawnFn, SpawnRef};

// Optional: expose a simple built-in event logger (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use log::LogSubscriber;
