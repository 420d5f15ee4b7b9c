//! # Error types used by the taskpool runtime and user-supplied work.
//!
//! This module defines the error enums, split by origin:
//!
//! - [`TaskError`] errors raised by user jobs, sources, and teardown hooks.
//! - [`PoolError`] errors raised by pool operations (claim/release/quit).
//! - [`BufferError`] errors raised by buffer operations (push after quit).
//! - [`RunError`] the terminal failure of an executor run, carrying the
//!   full [`RunReport`](crate::RunReport).
//!
//! All enums provide `as_label()` for short stable identifiers in events.
//! [`TaskError`] additionally has `is_abort()` to detect the abort sentinel.

use crate::core::RunReport;

use thiserror::Error;

/// # Errors produced by user-supplied work.
///
/// These originate in job callbacks, source resolution/advancement, runner
/// factories and fetches, or teardown hooks. They are collected into
/// [`RunReport::errors`](crate::RunReport) or emitted as `Error` events.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// Job execution failed.
    #[error("execution failed: {reason}")]
    Fail {
        /// Human-readable failure description.
        reason: String,
    },

    /// Distinguished abort sentinel.
    ///
    /// A job returning this error asks the executor to stop starting new
    /// jobs and mark the run aborted. This is **not an error** in the
    /// traditional sense: it is never recorded in
    /// [`RunReport::errors`](crate::RunReport) and never counts as fulfilled.
    #[error("abort signaled")]
    Abort,

    /// Source resolution or advancement failed.
    ///
    /// Recorded once; the executor stops pulling further items for the run.
    #[error("source failed: {reason}")]
    Source {
        /// What went wrong while resolving or advancing the source.
        reason: String,
    },

    /// Teardown hook failed.
    ///
    /// Recorded in the report but never prevents the run from finishing.
    #[error("teardown failed: {reason}")]
    Teardown {
        /// Teardown failure description.
        reason: String,
    },
}

impl TaskError {
    /// Convenience constructor for job failures.
    pub fn fail(reason: impl Into<String>) -> Self {
        TaskError::Fail {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Abort => "task_abort",
            TaskError::Source { .. } => "source_failed",
            TaskError::Teardown { .. } => "teardown_failed",
        }
    }

    /// Indicates whether this is the abort sentinel.
    pub fn is_abort(&self) -> bool {
        matches!(self, TaskError::Abort)
    }
}

impl From<PoolError> for TaskError {
    /// Pool failures observed inside pooled work (e.g.
    /// [`ScalingPool::run`](crate::ScalingPool::run) on a quitting pool)
    /// surface as plain task failures.
    fn from(e: PoolError) -> Self {
        TaskError::Fail {
            reason: e.to_string(),
        }
    }
}

/// # Errors produced by pool operations.
///
/// Claim and release misuse is surfaced here; factory and runner-quit
/// failures are reported as [`PoolEvent::Error`](crate::events::PoolEvent)
/// instead, since the pool recovers from them locally.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Claim was attempted after `quit()` was initiated.
    #[error("pool is shut down")]
    Closed,

    /// Released an instance this pool never owned.
    #[error("released instance is not owned by this pool")]
    UnknownInstance,

    /// Released an instance that was not claimed.
    #[error("released instance was not claimed")]
    NotClaimed,
}

impl PoolError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Closed => "pool_closed",
            PoolError::UnknownInstance => "pool_unknown_instance",
            PoolError::NotClaimed => "pool_not_claimed",
        }
    }
}

/// # Errors produced by buffer operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Push was attempted after `quit()` was initiated.
    ///
    /// Also returned to pushes that were suspended on a full buffer when
    /// quit began: the buffer only drains, it never accepts new items.
    #[error("buffer is shut down")]
    Closed,
}

impl BufferError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            BufferError::Closed => "buffer_closed",
        }
    }
}

/// # Terminal failure of an executor run.
///
/// Produced when [`ExecutorConfig::fail_on_error`](crate::ExecutorConfig) is
/// set and the run collected at least one error. Carries the complete
/// [`RunReport`](crate::RunReport), so partial results survive the failure.
pub struct RunError<V> {
    /// The full report of the failed run (results, errors, counters).
    pub report: RunReport<V>,
}

impl<V> RunError<V> {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        "run_failed"
    }
}

// Manual impls keep `V` free of `Debug`/`Display` bounds; the report's
// user-visible payload is summarized, not dumped.
impl<V> std::fmt::Debug for RunError<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunError")
            .field("results", &self.report.results.len())
            .field("errors", &self.report.errors)
            .field("fulfilled", &self.report.fulfilled)
            .field("aborted", &self.report.aborted)
            .finish()
    }
}

impl<V> std::fmt::Display for RunError<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "run failed with {} error(s); fulfilled={}, aborted={}",
            self.report.errors.len(),
            self.report.fulfilled,
            self.report.aborted
        )
    }
}

impl<V> std::error::Error for RunError<V> {}
