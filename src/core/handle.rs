//! # Run handle: an abortable, one-shot result future.
//!
//! [`RunHandle`] is the value returned by
//! [`Executor::run`](crate::Executor::run). It behaves as a future resolving
//! to the run outcome, and carries an [`abort`](RunHandle::abort) capability
//! wired to the executor's [`CancellationToken`].
//!
//! ## Rules
//! - The handle is completed **exactly once** by the executor's driver task,
//!   through the crate-internal [`RunCompleter`].
//! - `abort()` is cooperative: jobs already in flight run to completion, no
//!   new jobs are started, teardown still runs, and the handle still
//!   resolves with the (aborted) report.
//! - Dropping the handle does not cancel the run; it detaches from the
//!   result like dropping a `JoinHandle`.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::core::report::RunReport;
use crate::error::{RunError, TaskError};

/// Outcome type a [`RunHandle`] resolves to.
pub type RunOutcome<V> = Result<RunReport<V>, RunError<V>>;

/// Abortable handle to an in-flight executor run.
///
/// Awaiting the handle yields the run outcome. [`abort`](RunHandle::abort)
/// requests cooperative cancellation at any point before completion.
pub struct RunHandle<V> {
    rx: oneshot::Receiver<RunOutcome<V>>,
    token: CancellationToken,
}

impl<V> RunHandle<V> {
    /// Creates a connected `(completer, handle)` pair around `token`.
    pub(crate) fn channel(token: CancellationToken) -> (RunCompleter<V>, Self) {
        let (tx, rx) = oneshot::channel();
        (RunCompleter { tx: Some(tx) }, Self { rx, token })
    }

    /// Requests cooperative abort: no new jobs are started, in-flight jobs
    /// finish, and the resolved report carries `aborted = true`.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Returns true once abort has been requested.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<V> Future for RunHandle<V> {
    type Output = RunOutcome<V>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The driver task vanished without completing; surface a failed
            // run rather than hanging or panicking.
            Poll::Ready(Err(_)) => {
                let mut report = RunReport::new();
                report.errors.push(TaskError::fail("executor driver dropped"));
                Poll::Ready(Err(RunError { report }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// One-shot completion side of a [`RunHandle`].
pub(crate) struct RunCompleter<V> {
    tx: Option<oneshot::Sender<RunOutcome<V>>>,
}

impl<V> RunCompleter<V> {
    /// Completes the paired handle. Later calls are no-ops.
    pub(crate) fn complete(&mut self, outcome: RunOutcome<V>) {
        if let Some(tx) = self.tx.take() {
            // A dropped handle simply discards the outcome.
            let _ = tx.send(outcome);
        }
    }
}
