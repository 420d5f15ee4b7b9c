//! # Run report: the aggregated outcome of one executor run.
//!
//! [`RunReport`] collects whatever the run produced: outputs (unordered),
//! recorded errors, the fulfilled counter, and the aborted flag. It is the
//! success value of a [`RunHandle`](crate::RunHandle) and travels inside
//! [`RunError`](crate::RunError) when the run fails.

use crate::error::TaskError;

/// Aggregated outcome of a bounded-parallel run.
///
/// ## Field semantics
/// - `results`: job outputs, **unordered** (completions interleave)
/// - `errors`: recorded job/source/teardown errors, capped by
///   [`ExecutorConfig::max_errors`](crate::ExecutorConfig)
/// - `fulfilled`: jobs that completed without error or abort signal
/// - `aborted`: abort was requested on the handle, or a job returned the
///   [`TaskError::Abort`] sentinel
pub struct RunReport<V> {
    /// Collected job outputs, in completion order.
    pub results: Vec<V>,
    /// Recorded errors, oldest first.
    pub errors: Vec<TaskError>,
    /// Number of jobs that completed cleanly.
    pub fulfilled: u64,
    /// Whether the run was aborted (externally or by a job).
    pub aborted: bool,
}

impl<V> RunReport<V> {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            errors: Vec::new(),
            fulfilled: 0,
            aborted: false,
        }
    }

    /// Returns true if no errors were recorded and the run was not aborted.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.aborted
    }
}

impl<V> Default for RunReport<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impl keeps `V` free of a `Debug` bound; outputs are summarized.
impl<V> std::fmt::Debug for RunReport<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReport")
            .field("results", &self.results.len())
            .field("errors", &self.errors)
            .field("fulfilled", &self.fulfilled)
            .field("aborted", &self.aborted)
            .finish()
    }
}
