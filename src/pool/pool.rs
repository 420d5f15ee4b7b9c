//! # ScalingPool: elastic pool of reusable runner instances.
//!
//! Owns a dynamic list of [`Runner`]s created by a [`Spawn`] factory,
//! hands them out exclusively via `claim`/`release`/`run`, and grows or
//! shrinks inside `[min_instances, max_instances]` — responsively on claim
//! misses, periodically from observed utilization (see `scaler.rs`), or
//! explicitly through `scale_up`/`scale_down`.
//!
//! ## Architecture
//! ```text
//! claim() ──► available slot? ──► mark claimed, return instance
//!                │ no
//!                ├─► enqueue FIFO waiter
//!                └─► responsive? ──► spawn scale_up()
//!
//! release() ──► accumulate claimed time ──► Released event
//!                └─► live slot? ──► oldest waiter (or Available event)
//!
//! scale_up()   [serialized] factory → append slot → waiter/Available → Scale
//! scale_down() [serialized] mark victim → await unclaimed → detach → quit → Scale
//! quit()       reject claims → await scaling → drain slots (await releases)
//! ```
//!
//! ## Rules
//! - Pending claims resolve in strict **FIFO** order; abandoned waiters are
//!   skipped.
//! - Scale-up and scale-down are serialized by one async lock; `is_scaling`
//!   reflects it.
//! - Factory and runner-quit failures are `Error` events, never fatal: the
//!   pool stays alive and retries on later triggers.
//! - A `quitting` slot is invisible to claimers and silently reaped.
//! - `quit` is idempotent and safe to call concurrently.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::PoolConfig;
use crate::error::{PoolError, TaskError};
use crate::events::{Bus, PoolEvent, PoolEventKind};
use crate::pool::slot::Slot;
use crate::runners::{Runner, SpawnRef};

/// Elastic, utilization-scaled pool of runner instances.
///
/// The pool is a cheaply clonable handle; all clones share one instance
/// list. Construct with [`new`](ScalingPool::new), then call
/// [`spawn_scaler`](ScalingPool::spawn_scaler) once to start background
/// scaling (minimum convergence and, if configured, the periodic tick).
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use taskpool::{PoolConfig, Runner, ScalingPool, SpawnFn, TaskError};
///
/// struct Conn;
///
/// #[async_trait]
/// impl Runner for Conn {
///     async fn quit(&self) -> Result<(), TaskError> {
///         Ok(())
///     }
/// }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let pool = ScalingPool::new(SpawnFn::arc(|| async { Ok(Conn) }), PoolConfig::default());
///     pool.spawn_scaler();
///
///     let value = pool.run(|_conn| async { Ok::<_, TaskError>(42) }).await.unwrap();
///     assert_eq!(value, 42);
///     pool.quit().await;
/// }
/// ```
pub struct ScalingPool<R: Runner> {
    pub(crate) inner: Arc<PoolInner<R>>,
}

pub(crate) struct PoolInner<R> {
    pub(crate) cfg: PoolConfig,
    /// Normalized bounds, fixed at construction.
    pub(crate) min: usize,
    pub(crate) max: usize,
    pub(crate) factory: SpawnRef<R>,
    pub(crate) state: Mutex<PoolState<R>>,
    /// Serializes scale-up against scale-down (and quit against both).
    pub(crate) scale_lock: tokio::sync::Mutex<()>,
    pub(crate) scaling: AtomicBool,
    pub(crate) quitting: AtomicBool,
    /// Cancels the periodic tick on quit.
    pub(crate) tick_token: CancellationToken,
    pub(crate) bus: Bus<PoolEventKind>,
}

pub(crate) struct PoolState<R> {
    pub(crate) slots: Vec<Slot<R>>,
    /// FIFO queue of claim waiters.
    pub(crate) pending: VecDeque<oneshot::Sender<Arc<R>>>,
    /// Claimed wall-time accumulated since the last tick.
    pub(crate) usage_acc: Duration,
}

impl<R: Runner> Clone for ScalingPool<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Runner> ScalingPool<R> {
    /// Creates an empty pool around `factory`.
    ///
    /// No background tasks are started; call
    /// [`spawn_scaler`](ScalingPool::spawn_scaler) once subscribers are in
    /// place (the first scale-ups emit `Available` events).
    pub fn new(factory: SpawnRef<R>, cfg: PoolConfig) -> Self {
        let (min, max) = cfg.instance_bounds();
        Self {
            inner: Arc::new(PoolInner {
                cfg,
                min,
                max,
                factory,
                state: Mutex::new(PoolState {
                    slots: Vec::new(),
                    pending: VecDeque::new(),
                    usage_acc: Duration::ZERO,
                }),
                scale_lock: tokio::sync::Mutex::new(()),
                scaling: AtomicBool::new(false),
                quitting: AtomicBool::new(false),
                tick_token: CancellationToken::new(),
                bus: Bus::new(64),
            }),
        }
    }

    /// Reserves an available instance, suspending until one exists.
    ///
    /// A miss enqueues a FIFO waiter and — with responsive scaling enabled
    /// and headroom below `max_instances` — triggers an immediate scale-up
    /// without awaiting it.
    pub async fn claim(&self) -> Result<Arc<R>, PoolError> {
        if self.inner.quitting.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }
        let rx = {
            let mut st = self.lock_state();
            if let Some(slot) = st.slots.iter_mut().find(|s| s.is_available()) {
                slot.claimed_at = Some(Instant::now());
                return Ok(Arc::clone(&slot.instance));
            }
            let (tx, rx) = oneshot::channel();
            st.pending.push_back(tx);
            rx
        };

        if self.inner.cfg.responsive_enabled()
            && !self.inner.quitting.load(Ordering::Acquire)
            && self.instance_count() < self.inner.max
        {
            let pool = self.clone();
            tokio::spawn(async move { pool.scale_up().await });
        }

        rx.await.map_err(|_| PoolError::Closed)
    }

    /// Returns a claimed instance to the pool.
    ///
    /// Unknown instances are an error to the caller; releasing twice is
    /// reported (as an `Error` event and an `Err`) but leaves the pool
    /// consistent.
    pub fn release(&self, instance: &Arc<R>) -> Result<(), PoolError> {
        let mut st = self.lock_state();
        let Some(idx) = st
            .slots
            .iter()
            .position(|s| Arc::ptr_eq(&s.instance, instance))
        else {
            self.publish_pool_error(PoolError::UnknownInstance);
            return Err(PoolError::UnknownInstance);
        };
        let Some(claimed_at) = st.slots[idx].claimed_at.take() else {
            self.publish_pool_error(PoolError::NotClaimed);
            return Err(PoolError::NotClaimed);
        };
        st.usage_acc += claimed_at.elapsed();
        self.inner.bus.publish(PoolEventKind::Released);

        if !self.inner.quitting.load(Ordering::Acquire) && !st.slots[idx].quitting {
            self.offer_slot(&mut st, idx);
        }
        Ok(())
    }

    /// Claims an instance, applies `f`, and releases on every exit path.
    pub async fn run<V, F, Fut>(&self, f: F) -> Result<V, TaskError>
    where
        F: FnOnce(Arc<R>) -> Fut,
        Fut: Future<Output = Result<V, TaskError>>,
    {
        let instance = self.claim().await?;
        let out = f(Arc::clone(&instance)).await;
        if let Err(release_err) = self.release(&instance) {
            // A release failure must not mask the job's own error.
            if out.is_ok() {
                return Err(release_err.into());
            }
        }
        out
    }

    /// Grows the pool by one instance; a no-op at `max_instances` or while
    /// quitting. Serialized against other scaling; always emits `Scale`.
    pub async fn scale_up(&self) {
        let _guard = self.inner.scale_lock.lock().await;
        self.inner.scaling.store(true, Ordering::Release);

        if !self.inner.quitting.load(Ordering::Acquire) && self.instance_count() < self.inner.max {
            match self.inner.factory.spawn().await {
                Ok(instance) => {
                    let mut st = self.lock_state();
                    st.slots.push(Slot::new(Arc::new(instance)));
                    let idx = st.slots.len() - 1;
                    self.offer_slot(&mut st, idx);
                }
                Err(e) => self.inner.bus.publish(PoolEventKind::Error {
                    label: "factory_failed",
                    reason: e.to_string(),
                }),
            }
        }

        self.inner.bus.publish(PoolEventKind::Scale {
            instances: self.instance_count(),
        });
        self.inner.scaling.store(false, Ordering::Release);
    }

    /// Shrinks the pool by one instance, preferring an unclaimed one; a
    /// no-op at `min_instances`. If every candidate is claimed, waits for a
    /// release before detaching.
    pub async fn scale_down(&self) {
        self.scale_down_inner(None).await;
    }

    /// Like [`scale_down`](ScalingPool::scale_down), but removes the given
    /// instance (typically one pre-marked via
    /// [`kill_runner`](ScalingPool::kill_runner)).
    pub async fn scale_down_target(&self, target: &Arc<R>) {
        self.scale_down_inner(Some(target)).await;
    }

    async fn scale_down_inner(&self, target: Option<&Arc<R>>) {
        let _guard = self.inner.scale_lock.lock().await;
        self.inner.scaling.store(true, Ordering::Release);

        let victim: Option<Arc<R>> = {
            let mut st = self.lock_state();
            match target {
                Some(t) => match st
                    .slots
                    .iter()
                    .position(|s| Arc::ptr_eq(&s.instance, t))
                {
                    // Pre-marked terminal: proceed regardless of the floor,
                    // kill_runner already honored it.
                    Some(idx) if st.slots[idx].quitting => Some(Arc::clone(t)),
                    Some(idx) => self.mark_victim(&mut st, Some(idx)),
                    None => None,
                },
                None => self.mark_victim(&mut st, None),
            }
        };

        if let Some(victim) = victim {
            self.detach_and_quit(&victim).await;
        }

        self.inner.bus.publish(PoolEventKind::Scale {
            instances: self.instance_count(),
        });
        self.inner.scaling.store(false, Ordering::Release);
    }

    /// Marks an instance terminal so the next scale-down removes it.
    ///
    /// Prefers `preferred`, else an unclaimed slot, else the first live
    /// slot. Returns `None` — and marks nothing — when removal would drop
    /// the live-instance count below `min_instances`.
    pub fn kill_runner(&self, preferred: Option<&Arc<R>>) -> Option<Arc<R>> {
        let mut st = self.lock_state();
        let idx = preferred.and_then(|p| {
            st.slots
                .iter()
                .position(|s| Arc::ptr_eq(&s.instance, p))
        });
        self.mark_victim(&mut st, idx)
    }

    /// Graceful shutdown: rejects new claims, waits out any in-flight
    /// scaling, then drains and quits every instance, awaiting releases for
    /// the claimed ones. Idempotent.
    pub async fn quit(&self) {
        self.inner.quitting.store(true, Ordering::Release);
        self.inner.tick_token.cancel();
        let _guard = self.inner.scale_lock.lock().await;

        // Pending claimers learn about the shutdown immediately.
        {
            let mut st = self.lock_state();
            st.pending.clear();
        }

        let mut rx = self.inner.bus.subscribe();
        loop {
            let batch: Vec<Arc<R>> = {
                let mut st = self.lock_state();
                let mut batch = Vec::new();
                let mut i = 0;
                while i < st.slots.len() {
                    if st.slots[i].claimed_at.is_none() {
                        batch.push(st.slots.remove(i).instance);
                    } else {
                        i += 1;
                    }
                }
                batch
            };
            for instance in batch {
                if let Err(e) = instance.quit().await {
                    self.inner.bus.publish(PoolEventKind::Error {
                        label: "runner_quit_failed",
                        reason: e.to_string(),
                    });
                }
            }
            if self.instance_count() == 0 {
                break;
            }
            // Everything left is claimed; wake on the next release.
            match rx.recv().await {
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }

        self.inner.bus.publish(PoolEventKind::Scale { instances: 0 });
    }

    // ---------------------------
    // Accessors
    // ---------------------------

    /// Current number of pooled instances (including terminal slots still
    /// awaiting removal).
    pub fn instance_count(&self) -> usize {
        self.lock_state().slots.len()
    }

    /// Number of instances currently claimed.
    pub fn claimed_count(&self) -> usize {
        self.lock_state()
            .slots
            .iter()
            .filter(|s| s.claimed_at.is_some())
            .count()
    }

    /// Number of claimers waiting for an instance.
    pub fn pending_claims(&self) -> usize {
        self.lock_state()
            .pending
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    /// True while a scale-up or scale-down is in flight.
    pub fn is_scaling(&self) -> bool {
        self.inner.scaling.load(Ordering::Acquire)
    }

    /// True once quit has been initiated.
    pub fn is_quitting(&self) -> bool {
        self.inner.quitting.load(Ordering::Acquire)
    }

    /// Configured lower bound (normalized).
    pub fn min_instances(&self) -> usize {
        self.inner.min
    }

    /// Configured upper bound (normalized).
    pub fn max_instances(&self) -> usize {
        self.inner.max
    }

    /// Subscribes to available/released/scale/usage/error notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PoolEvent> {
        self.inner.bus.subscribe()
    }

    // ---------------------------
    // Internals
    // ---------------------------

    /// Hands the slot at `idx` to the oldest live waiter, or announces it.
    ///
    /// Called with the state lock held whenever a slot becomes available
    /// (freshly created or just released).
    fn offer_slot(&self, st: &mut PoolState<R>, idx: usize) {
        while let Some(tx) = st.pending.pop_front() {
            st.slots[idx].claimed_at = Some(Instant::now());
            match tx.send(Arc::clone(&st.slots[idx].instance)) {
                Ok(()) => return,
                // Waiter abandoned its claim; try the next one.
                Err(_) => st.slots[idx].claimed_at = None,
            }
        }
        self.inner.bus.publish(PoolEventKind::Available);
    }

    /// Picks and marks a terminal slot, honoring the `min_instances` floor.
    fn mark_victim(&self, st: &mut PoolState<R>, preferred: Option<usize>) -> Option<Arc<R>> {
        let live = st.slots.iter().filter(|s| !s.quitting).count();
        if live <= self.inner.min {
            return None;
        }
        let idx = preferred
            .filter(|&i| !st.slots[i].quitting)
            .or_else(|| st.slots.iter().position(|s| s.is_available()))
            .or_else(|| st.slots.iter().position(|s| !s.quitting))?;
        st.slots[idx].quitting = true;
        Some(Arc::clone(&st.slots[idx].instance))
    }

    /// Waits until `victim` is unclaimed, detaches it, and quits it.
    async fn detach_and_quit(&self, victim: &Arc<R>) {
        let mut rx = self.inner.bus.subscribe();
        loop {
            let detached = {
                let mut st = self.lock_state();
                match st
                    .slots
                    .iter()
                    .position(|s| Arc::ptr_eq(&s.instance, victim))
                {
                    None => Some(None),
                    Some(idx) if st.slots[idx].claimed_at.is_none() => {
                        Some(Some(st.slots.remove(idx).instance))
                    }
                    Some(_) => None,
                }
            };
            match detached {
                Some(Some(instance)) => {
                    if let Err(e) = instance.quit().await {
                        self.inner.bus.publish(PoolEventKind::Error {
                            label: "runner_quit_failed",
                            reason: e.to_string(),
                        });
                    }
                    return;
                }
                Some(None) => return,
                None => match rx.recv().await {
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }

    fn publish_pool_error(&self, err: PoolError) {
        self.inner.bus.publish(PoolEventKind::Error {
            label: err.as_label(),
            reason: err.to_string(),
        });
    }

    /// State access that survives a poisoned lock (mutations are single
    /// calls; a panicking holder leaves the list itself consistent).
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, PoolState<R>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
