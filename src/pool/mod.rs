//! Scaling pool: claim/release lifecycle and utilization-driven elasticity.
//!
//! The only public API re-exported from here is [`ScalingPool`]. Everything
//! else is an internal building block it wires together.
//!
//! ## Files & responsibilities
//! - **pool.rs**: the pool itself — claim/release/run, explicit scale
//!   hooks, terminal-slot marking (`kill_runner`), graceful quit, accessors,
//!   and the FIFO pending-claim queue.
//! - **scaler.rs**: utilization metering and the periodic tick, plus the
//!   startup convergence to `min_instances`.
//! - **slot.rs**: per-instance wrapper (claim timestamp, terminal flag).
//!
//! ## Event data-plane (who publishes & who consumes)
//!
//! Producers (publish to the pool's bus):
//! - **pool.rs** → `Available`, `Released`, `Scale`, `Error`
//! - **scaler.rs** → `Usage`
//!
//! Consumers (subscribe):
//! - **scale-down / quit drains** — wait for `Released` before detaching a
//!   claimed victim
//! - **PollingBuffer's poll driver** — launches a poll per `Available`
//! - user subscribers via [`ScalingPool::subscribe`]

mod pool;
mod scaler;
mod slot;

pub use pool::ScalingPool;
