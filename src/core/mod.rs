//! Executor core: source resolution, scheduling, and run handles.
//!
//! This module contains the bounded-parallel execution machinery. The public
//! API re-exported from here is [`Executor`], the [`execute`] /
//! [`execute_with_teardown`] shorthands, [`RunHandle`], [`RunReport`], and
//! [`Source`]; the driver loop itself is internal.
//!
//! ## Files & responsibilities
//! - **executor.rs**: public facade and the per-run driver task; owns the
//!   fill/drain loop, error policies, abort handling, and teardown.
//! - **source.rs**: the tagged union of accepted input shapes and its
//!   single-point normalization to `(stream, init?)`.
//! - **handle.rs**: abortable one-shot result future (`RunHandle`) and its
//!   crate-internal completion side.
//! - **report.rs**: the aggregated run outcome (`RunReport`).
//!
//! ## Wiring (module-level flow)
//! ```text
//! Executor::run(source, job)
//!   ├─ RunHandle::channel(token)        → (completer, handle) ── returned
//!   └─ tokio::spawn(drive(...))
//!
//! drive()
//!   ├─ source.resolve()                 → (stream, init?)   [or recorded error]
//!   ├─ fill/drain loop                  → JoinSet of job futures, ≤ parallel
//!   ├─ teardown(init?)                  → recorded on failure
//!   └─ completer.complete(outcome)      → handle resolves
//!
//! handle.abort() ──► token.cancel() ──► fill loop stops pulling; drain
//! continues; report.aborted = true
//! ```

mod executor;
mod handle;
mod report;
mod source;

pub use executor::{execute, execute_with_teardown, Executor};
pub use handle::{RunHandle, RunOutcome};
pub use report::RunReport;
pub use source::Source;
