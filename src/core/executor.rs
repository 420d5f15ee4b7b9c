//! # Executor: bounded-parallel scheduling over a lazy source.
//!
//! The [`Executor`] drives up to `parallel` concurrent invocations of a user
//! job over the items of a [`Source`], aggregating outputs and errors into a
//! [`RunReport`] without losing either.
//!
//! ## Architecture
//! ```text
//! Source ──► resolve() ──► (stream, init?)
//!                              │
//!                              ▼
//!                       driver task (one per run)
//!                       loop {
//!                         ├─► fill: pull stream while
//!                         │         in-flight < parallel
//!                         │         && !aborted
//!                         │         && (continue_on_error || no errors)
//!                         │     └─► JoinSet::spawn(job(item, init))
//!                         ├─► in-flight == 0 → break
//!                         └─► join_next():
//!                               ├─► Ok(v)          → fulfilled++, store
//!                               ├─► Err(Abort)     → aborted = true
//!                               ├─► Err(e)         → record (maxErrors cap)
//!                               └─► panic          → record
//!                       }
//!                       teardown(init?) → finish handle
//! ```
//!
//! ## Rules
//! - Only the driver advances the stream, so pulls are **never concurrent**
//!   (an async source's internal state is safe without locking).
//! - Stream `Err` items and resolution failures are recorded once and force
//!   `continue_on_error = false` for the rest of the run.
//! - Abort is cooperative: in-flight jobs finish, the stream is not pulled
//!   again, teardown still runs.
//! - Teardown runs exactly once, after in-flight reaches zero; its failure
//!   is recorded but never prevents completion.
//! - Result order is **not** input order; completions interleave.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::StreamExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::ExecutorConfig;
use crate::core::handle::{RunCompleter, RunHandle};
use crate::core::report::RunReport;
use crate::core::source::{Resolved, Source};
use crate::error::{RunError, TaskError};

/// Boxed teardown hook, invoked once after the run drains.
type BoxTeardown<I> =
    Box<dyn FnOnce(Option<Arc<I>>) -> BoxFuture<'static, Result<(), TaskError>> + Send>;

/// Bounded-parallel executor.
///
/// Holds only configuration; each [`run`](Executor::run) spawns an
/// independent driver task and returns an abortable [`RunHandle`].
///
/// ## Example
/// ```rust
/// use taskpool::{Executor, ExecutorConfig, Source, TaskError};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let exec = Executor::new(ExecutorConfig {
///         parallel: 4,
///         ..Default::default()
///     });
///     let handle = exec.run(Source::<u32>::iter(1..=10), |n, _| async move {
///         Ok::<_, TaskError>(n * 2)
///     });
///     let report = handle.await.unwrap();
///     assert_eq!(report.fulfilled, 10);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Executor {
    cfg: ExecutorConfig,
}

impl Executor {
    /// Creates an executor with the given configuration.
    pub fn new(cfg: ExecutorConfig) -> Self {
        Self { cfg }
    }

    /// Starts a run over `source`, returning immediately with its handle.
    ///
    /// The job receives each item plus the source's init value (if any).
    pub fn run<T, I, V, F, Fut>(&self, source: Source<T, I>, job: F) -> RunHandle<V>
    where
        T: Send + 'static,
        I: Send + Sync + 'static,
        V: Send + 'static,
        F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    {
        self.spawn_run(source, job, None)
    }

    /// Like [`run`](Executor::run), with a teardown hook invoked exactly
    /// once after the last in-flight job finishes.
    pub fn run_with_teardown<T, I, V, F, Fut, D, DFut>(
        &self,
        source: Source<T, I>,
        job: F,
        teardown: D,
    ) -> RunHandle<V>
    where
        T: Send + 'static,
        I: Send + Sync + 'static,
        V: Send + 'static,
        F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
        D: FnOnce(Option<Arc<I>>) -> DFut + Send + 'static,
        DFut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        let boxed: BoxTeardown<I> = Box::new(move |init| Box::pin(teardown(init)));
        self.spawn_run(source, job, Some(boxed))
    }

    fn spawn_run<T, I, V, F, Fut>(
        &self,
        source: Source<T, I>,
        job: F,
        teardown: Option<BoxTeardown<I>>,
    ) -> RunHandle<V>
    where
        T: Send + 'static,
        I: Send + Sync + 'static,
        V: Send + 'static,
        F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (completer, handle) = RunHandle::channel(token.clone());
        tokio::spawn(drive(self.cfg.clone(), source, job, teardown, token, completer));
        handle
    }
}

/// Starts a run with the given config; shorthand for
/// `Executor::new(cfg).run(source, job)`.
pub fn execute<T, I, V, F, Fut>(
    source: Source<T, I>,
    job: F,
    cfg: ExecutorConfig,
) -> RunHandle<V>
where
    T: Send + 'static,
    I: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
{
    Executor::new(cfg).run(source, job)
}

/// Starts a run with a teardown hook; shorthand for
/// `Executor::new(cfg).run_with_teardown(source, job, teardown)`.
pub fn execute_with_teardown<T, I, V, F, Fut, D, DFut>(
    source: Source<T, I>,
    job: F,
    cfg: ExecutorConfig,
    teardown: D,
) -> RunHandle<V>
where
    T: Send + 'static,
    I: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
    D: FnOnce(Option<Arc<I>>) -> DFut + Send + 'static,
    DFut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Executor::new(cfg).run_with_teardown(source, job, teardown)
}

/// Records `err` unless the retention cap is reached.
fn record_error<V>(report: &mut RunReport<V>, cfg: &ExecutorConfig, err: TaskError) {
    if cfg.may_record_error(report.errors.len()) {
        report.errors.push(err);
    }
}

/// The per-run driver task.
async fn drive<T, I, V, F, Fut>(
    cfg: ExecutorConfig,
    source: Source<T, I>,
    job: F,
    teardown: Option<BoxTeardown<I>>,
    token: CancellationToken,
    mut completer: RunCompleter<V>,
) where
    T: Send + 'static,
    I: Send + Sync + 'static,
    V: Send + 'static,
    F: Fn(T, Option<Arc<I>>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, TaskError>> + Send + 'static,
{
    let mut report: RunReport<V> = RunReport::new();
    let mut continue_on_error = cfg.continue_on_error;

    let resolved = tokio::select! {
        _ = token.cancelled() => None,
        resolved = source.resolve() => Some(resolved),
    };
    let (mut stream, init) = match resolved {
        None => {
            report.aborted = true;
            (None, None)
        }
        Some(Ok(Resolved { stream, init })) => (Some(stream), init),
        Some(Err(e)) => {
            record_error(&mut report, &cfg, e);
            continue_on_error = false;
            (None, None)
        }
    };

    let parallel = cfg.parallel_clamped();
    let mut set: JoinSet<Result<V, TaskError>> = JoinSet::new();
    let mut exhausted = stream.is_none();

    'run: loop {
        // Fill phase. Only this task pulls the stream, one item at a time.
        while !exhausted
            && set.len() < parallel
            && !report.aborted
            && (continue_on_error || report.errors.is_empty())
        {
            if token.is_cancelled() {
                report.aborted = true;
                break;
            }
            let Some(stream) = stream.as_mut() else {
                exhausted = true;
                break;
            };
            let next = tokio::select! {
                _ = token.cancelled() => {
                    report.aborted = true;
                    break;
                }
                item = stream.next() => item,
            };
            match next {
                Some(Ok(item)) => {
                    set.spawn(job(item, init.clone()));
                }
                Some(Err(e)) => {
                    record_error(&mut report, &cfg, e);
                    continue_on_error = false;
                    exhausted = true;
                }
                None => exhausted = true,
            }
        }

        if set.is_empty() {
            break 'run;
        }

        match set.join_next().await {
            Some(Ok(Ok(value))) => {
                report.fulfilled += 1;
                if cfg.store_output {
                    report.results.push(value);
                }
            }
            Some(Ok(Err(e))) if e.is_abort() => report.aborted = true,
            Some(Ok(Err(e))) => record_error(&mut report, &cfg, e),
            Some(Err(join_err)) => record_error(
                &mut report,
                &cfg,
                TaskError::fail(format!("job panicked: {join_err}")),
            ),
            None => break 'run,
        }
    }

    // An abort that raced past the scheduling checks still marks the report.
    if token.is_cancelled() {
        report.aborted = true;
    }

    if let Some(td) = teardown {
        if let Err(e) = td(init.clone()).await {
            let err = match e {
                TaskError::Teardown { .. } => e,
                other => TaskError::Teardown {
                    reason: other.to_string(),
                },
            };
            record_error(&mut report, &cfg, err);
        }
    }

    let outcome = if cfg.fail_on_error && !report.errors.is_empty() {
        Err(RunError { report })
    } else {
        Ok(report)
    };
    completer.complete(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::sleep;

    fn cfg(parallel: usize) -> ExecutorConfig {
        ExecutorConfig {
            parallel,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn empty_source_yields_empty_clean_report() {
        let handle = execute(
            Source::<u32>::iter(Vec::new()),
            |n, _| async move { Ok::<_, TaskError>(n) },
            cfg(4),
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 0);
        assert!(report.results.is_empty());
        assert!(report.errors.is_empty());
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn collects_all_results_as_multiset() {
        let handle = execute(
            Source::<u32>::iter(1..=10),
            |n, _| async move {
                sleep(Duration::from_millis(u64::from(n))).await;
                Ok::<_, TaskError>(n)
            },
            cfg(4),
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 10);

        let mut results = report.results.clone();
        results.sort_unstable();
        assert_eq!(results, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn never_exceeds_parallel_in_flight() {
        static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
        static PEAK: AtomicUsize = AtomicUsize::new(0);

        let handle = execute(
            Source::<u32>::iter(1..=20),
            |_, _| async {
                let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
                PEAK.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            },
            cfg(3),
        );
        handle.await.unwrap();
        assert!(PEAK.load(Ordering::SeqCst) <= 3);
        assert!(PEAK.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn continue_on_error_collects_failures_and_keeps_going() {
        let handle = execute(
            Source::<u32>::iter(1..=6),
            |n, _| async move {
                if n == 3 {
                    Err(TaskError::fail(format!("{n} failed")))
                } else {
                    sleep(Duration::from_millis(5)).await;
                    Ok(n)
                }
            },
            ExecutorConfig {
                parallel: 2,
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 5);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].to_string().contains("3 failed"));
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn stop_on_error_lets_in_flight_finish() {
        let handle = execute(
            Source::<u32>::iter(1..=6),
            |n, _| async move {
                if n == 3 {
                    Err(TaskError::fail("3 failed"))
                } else {
                    sleep(Duration::from_millis(10)).await;
                    Ok(n)
                }
            },
            ExecutorConfig {
                parallel: 3,
                continue_on_error: false,
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        // 1 and 2 were already running when 3 failed fast.
        assert_eq!(report.fulfilled, 2);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn fail_on_error_wraps_report_in_run_error() {
        let handle = execute(
            Source::<u32>::iter(1..=3),
            |n, _| async move {
                if n == 2 {
                    Err(TaskError::fail("nope"))
                } else {
                    Ok(n)
                }
            },
            cfg(1),
        );
        let err = handle.await.unwrap_err();
        assert_eq!(err.report.fulfilled, 2);
        assert_eq!(err.report.errors.len(), 1);
    }

    #[tokio::test]
    async fn abort_sentinel_stops_scheduling_without_erroring() {
        let handle = execute(
            Source::<u32>::iter(1..=7),
            |n, _| async move {
                if n == 4 {
                    Err(TaskError::Abort)
                } else {
                    Ok(n)
                }
            },
            ExecutorConfig {
                parallel: 1,
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 3);
        assert!(report.errors.is_empty());
        assert!(report.aborted);
    }

    #[tokio::test]
    async fn external_abort_finishes_in_flight_only() {
        let handle = execute(
            Source::<u32>::iter(1..=6),
            |_, _| async {
                sleep(Duration::from_millis(50)).await;
                Ok::<_, TaskError>(())
            },
            cfg(1),
        );
        sleep(Duration::from_millis(100)).await;
        handle.abort();
        let report = handle.await.unwrap();
        assert!(report.aborted);
        assert!(report.fulfilled >= 1 && report.fulfilled <= 3);
    }

    #[tokio::test]
    async fn max_errors_caps_retention_but_not_counting() {
        let handle = execute(
            Source::<u32>::iter(1..=10),
            |n, _| async move { Err::<(), _>(TaskError::fail(format!("{n}"))) },
            ExecutorConfig {
                parallel: 2,
                max_errors: Some(3),
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.fulfilled, 0);
    }

    #[tokio::test]
    async fn store_output_false_discards_results() {
        let handle = execute(
            Source::<u32>::iter(1..=5),
            |n, _| async move { Ok::<_, TaskError>(n) },
            ExecutorConfig {
                parallel: 2,
                store_output: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 5);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn source_failure_records_once_and_stops() {
        let handle = execute(
            Source::<u32>::produce(|| async {
                Err(TaskError::Source {
                    reason: "backend down".into(),
                })
            }),
            |n, _| async move { Ok::<_, TaskError>(n) },
            ExecutorConfig {
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 0);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].as_label(), "source_failed");
    }

    #[tokio::test]
    async fn stream_item_error_forces_stop() {
        let items = futures::stream::iter(vec![
            Ok(1u32),
            Ok(2),
            Err(TaskError::Source {
                reason: "advance failed".into(),
            }),
            Ok(4),
        ]);
        let handle = execute(
            Source::<u32>::try_stream(items),
            |n, _| async move { Ok::<_, TaskError>(n) },
            ExecutorConfig {
                parallel: 1,
                fail_on_error: false,
                ..Default::default()
            },
        );
        let report = handle.await.unwrap();
        // Item 4 is never pulled after the advance error.
        assert_eq!(report.fulfilled, 2);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn teardown_runs_once_after_drain() {
        static TEARDOWNS: AtomicUsize = AtomicUsize::new(0);
        static STILL_RUNNING: AtomicUsize = AtomicUsize::new(0);

        let handle = execute_with_teardown(
            Source::<u32>::iter(1..=6),
            |_, _| async {
                STILL_RUNNING.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(5)).await;
                STILL_RUNNING.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TaskError>(())
            },
            cfg(3),
            |_| async {
                TEARDOWNS.fetch_add(1, Ordering::SeqCst);
                assert_eq!(STILL_RUNNING.load(Ordering::SeqCst), 0);
                Ok(())
            },
        );
        handle.await.unwrap();
        assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_failure_is_recorded_but_run_finishes() {
        let handle = execute_with_teardown(
            Source::<u32>::iter(1..=2),
            |n, _| async move { Ok::<_, TaskError>(n) },
            ExecutorConfig {
                fail_on_error: false,
                ..Default::default()
            },
            |_| async { Err(TaskError::fail("cleanup broke")) },
        );
        let report = handle.await.unwrap();
        assert_eq!(report.fulfilled, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].as_label(), "teardown_failed");
    }

    #[tokio::test]
    async fn init_reaches_jobs_and_teardown() {
        static SEEN_IN_TEARDOWN: AtomicUsize = AtomicUsize::new(0);

        let source = Source::with_init(Source::iter(vec![10u32, 20]), 7usize);
        let handle = execute_with_teardown(
            source,
            |n, init| async move {
                let base = init.as_deref().copied().unwrap_or(0);
                Ok::<_, TaskError>(n as usize + base)
            },
            cfg(2),
            |init| async move {
                SEEN_IN_TEARDOWN.store(init.as_deref().copied().unwrap_or(0), Ordering::SeqCst);
                Ok(())
            },
        );
        let report = handle.await.unwrap();
        let mut results = report.results.clone();
        results.sort_unstable();
        assert_eq!(results, vec![17, 27]);
        assert_eq!(SEEN_IN_TEARDOWN.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn parallelism_shortens_wall_clock() {
        let started = std::time::Instant::now();
        let handle = execute(
            Source::<u32>::iter(1..=8),
            |_, _| async {
                sleep(Duration::from_millis(20)).await;
                Ok::<_, TaskError>(())
            },
            cfg(4),
        );
        handle.await.unwrap();
        let elapsed = started.elapsed();
        // 8 jobs × 20ms at 4-way parallelism ≈ 2 waves.
        assert!(elapsed < Duration::from_millis(160));
    }
}
