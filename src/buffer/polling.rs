//! # PollingBuffer: a pool of fetchers feeding a bounded buffer.
//!
//! Composes an [`AsyncBuffer`] with a [`ScalingPool`] of
//! [`PollingRunner`]s. Available runners are driven to fetch; results are
//! pushed to the buffer under backpressure; idle runners are reaped. Pool
//! timers are disabled (`auto_scale = false`, `responsive_scale = false`):
//! scaling is driven entirely by poll outcomes.
//!
//! ## Architecture
//! ```text
//! pool `Available` ──► driver ──► spawn poll task
//!
//! poll task:
//!   ├─► wait buffer has space          (backpressure before claiming)
//!   ├─► claim runner ──► fetch()
//!   ├─► Timeout / empty batch:
//!   │     └─► above min && not scaling → kill_runner(this)
//!   ├─► batch: push each item (awaiting space)
//!   ├─► release runner
//!   ├─► killed? → streak = 0, scale_down(killed)
//!   └─► success? → streak += 1
//!         └─► streak > 2 × instances → streak = 0, scale_up()
//! ```
//!
//! ## Rules
//! - An empty batch reaps like a timeout but is a clean round-trip; a fetch
//!   error reaps like a timeout **and** is republished as an `Error` event.
//! - Scale and error notifications from the pool are republished on the
//!   buffer's bus, so consumers watch one event surface.
//! - Shutdown order matters: stop launching polls, initiate pool quit, wait
//!   for the buffer to drain (in-flight producers must land their pushes),
//!   await the pool, then quit the buffer.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::buffer::queue::AsyncBuffer;
use crate::config::{BufferConfig, PoolConfig};
use crate::error::BufferError;
use crate::events::{BufferEvent, BufferEventKind, PoolEventKind};
use crate::pool::ScalingPool;
use crate::runners::{Fetch, PollingRunner, SpawnRef};

/// Bounded buffer fed by a self-scaling pool of polling runners.
///
/// The buffer side (`pop`, `stream`, `len`) behaves exactly like
/// [`AsyncBuffer`]; production is owned by the pool.
pub struct PollingBuffer<R: PollingRunner> {
    buffer: AsyncBuffer<R::Item>,
    pool: ScalingPool<R>,
    running: Arc<AtomicBool>,
    polls_in_flight: Arc<AtomicUsize>,
    /// Consecutive successful fetches since the last scaling action.
    streak: Arc<AtomicU64>,
    driver_token: CancellationToken,
}

impl<R: PollingRunner> Clone for PollingBuffer<R> {
    fn clone(&self) -> Self {
        Self {
            buffer: self.buffer.clone(),
            pool: self.pool.clone(),
            running: Arc::clone(&self.running),
            polls_in_flight: Arc::clone(&self.polls_in_flight),
            streak: Arc::clone(&self.streak),
            driver_token: self.driver_token.clone(),
        }
    }
}

impl<R: PollingRunner> PollingBuffer<R> {
    /// Creates the composed buffer and starts polling.
    ///
    /// `pool_cfg` is taken with `auto_scale` and `responsive_scale` forced
    /// off; the configured bounds and thresholds still apply.
    pub fn new(factory: SpawnRef<R>, pool_cfg: PoolConfig, buffer_cfg: BufferConfig) -> Self {
        let pool_cfg = PoolConfig {
            auto_scale: false,
            responsive_scale: false,
            ..pool_cfg
        };
        let this = Self {
            buffer: AsyncBuffer::new(buffer_cfg),
            pool: ScalingPool::new(factory, pool_cfg),
            running: Arc::new(AtomicBool::new(true)),
            polls_in_flight: Arc::new(AtomicUsize::new(0)),
            streak: Arc::new(AtomicU64::new(0)),
            driver_token: CancellationToken::new(),
        };
        // Subscribe before the first scale-up so no Available event is lost.
        this.spawn_driver();
        this.pool.spawn_scaler();
        this
    }

    /// Removes the oldest buffered item; `None` after quit has drained.
    pub async fn pop(&self) -> Option<R::Item> {
        self.buffer.pop().await
    }

    /// Pushes an externally produced item, subject to the same capacity.
    pub async fn push(&self, item: R::Item) -> Result<(), BufferError> {
        self.buffer.push(item).await
    }

    /// Consumes the buffer as a lazy stream, ending after quit drains.
    pub fn stream(&self) -> impl futures::Stream<Item = R::Item> + Send + 'static {
        self.buffer.stream()
    }

    /// Current number of buffered items.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Buffer capacity.
    pub fn max_size(&self) -> usize {
        self.buffer.max_size()
    }

    /// Returns false once quit has been initiated.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of poll tasks currently in flight.
    pub fn polls_in_flight(&self) -> usize {
        self.polls_in_flight.load(Ordering::Acquire)
    }

    /// The pool driving production (for instance-count introspection).
    pub fn pool(&self) -> &ScalingPool<R> {
        &self.pool
    }

    /// Subscribes to push/pop/scale/error notifications.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<BufferEvent> {
        self.buffer.subscribe()
    }

    /// Graceful shutdown.
    ///
    /// Stops launching polls, initiates pool quit, waits for the buffer to
    /// drain so producers holding fetched data can land their pushes, awaits
    /// the pool, then quits the buffer. Idempotent.
    pub async fn quit(&self) {
        self.running.store(false, Ordering::Release);
        self.driver_token.cancel();

        let pool = self.pool.clone();
        let pool_quit = tokio::spawn(async move { pool.quit().await });

        self.buffer.wait_empty().await;
        let _ = pool_quit.await;
        self.buffer.quit().await;
    }

    /// Listens for pool events: launches polls on `Available`, republishes
    /// `Scale`/`Error` on the buffer bus.
    fn spawn_driver(&self) {
        let this = self.clone();
        let mut rx = self.pool.subscribe();
        let token = self.driver_token.clone();

        tokio::spawn(async move {
            loop {
                let ev = tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => ev,
                };
                match ev {
                    Ok(ev) => match ev.kind {
                        PoolEventKind::Available => {
                            if !this.running.load(Ordering::Acquire) {
                                break;
                            }
                            let worker = this.clone();
                            worker.polls_in_flight.fetch_add(1, Ordering::SeqCst);
                            tokio::spawn(async move {
                                worker.poll_once().await;
                                worker.polls_in_flight.fetch_sub(1, Ordering::SeqCst);
                            });
                        }
                        PoolEventKind::Scale { instances } => this
                            .buffer
                            .bus()
                            .publish(BufferEventKind::Scale { instances }),
                        PoolEventKind::Error { label, reason } => this
                            .buffer
                            .bus()
                            .publish(BufferEventKind::Error { label, reason }),
                        _ => {}
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// One poll: backpressure gate, claim, fetch, interpret, release, scale.
    async fn poll_once(&self) {
        if self.buffer.wait_not_full().await.is_err() {
            return;
        }
        if !self.running.load(Ordering::Acquire) {
            return;
        }
        let instance = match self.pool.claim().await {
            Ok(instance) => instance,
            Err(_) => return,
        };

        let fetched = instance.fetch().await;
        let idle = match &fetched {
            Ok(f) => f.is_idle(),
            Err(_) => true,
        };

        // Reap decision happens while the runner is still claimed, so no
        // other poll can race this instance back into rotation.
        let mut killed = None;
        if idle
            && self.pool.instance_count() > self.pool.min_instances()
            && !self.pool.is_scaling()
        {
            killed = self.pool.kill_runner(Some(&instance));
        }

        let fetch_err = match fetched {
            Ok(Fetch::Batch(items)) => {
                for item in items {
                    // Fails only once quit has begun; drop the rest.
                    if self.buffer.push(item).await.is_err() {
                        break;
                    }
                }
                None
            }
            Ok(Fetch::Timeout) => None,
            Err(e) => Some(e),
        };

        let _ = self.pool.release(&instance);

        if let Some(e) = fetch_err {
            self.buffer.bus().publish(BufferEventKind::Error {
                label: e.as_label(),
                reason: e.to_string(),
            });
        }

        if idle {
            if let Some(killed) = killed {
                self.streak.store(0, Ordering::SeqCst);
                self.pool.scale_down_target(&killed).await;
            }
        } else {
            let streak = self.streak.fetch_add(1, Ordering::SeqCst) + 1;
            if streak > 2 * self.pool.instance_count() as u64 {
                self.streak.store(0, Ordering::SeqCst);
                self.pool.scale_up().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicU8;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::{sleep, timeout};

    use crate::error::TaskError;
    use crate::runners::{Runner, SpawnFn};

    const MODE_BATCH: u8 = 0;
    const MODE_TIMEOUT: u8 = 1;
    const MODE_EMPTY: u8 = 2;

    /// Scripted fetcher: behavior switched through a shared mode flag.
    struct Tail {
        mode: Arc<AtomicU8>,
        counter: Arc<AtomicU64>,
    }

    #[async_trait]
    impl Runner for Tail {
        async fn quit(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    #[async_trait]
    impl PollingRunner for Tail {
        type Item = u64;

        async fn fetch(&self) -> Result<Fetch<u64>, TaskError> {
            // A real fetch blocks on the remote end for a while.
            sleep(Duration::from_millis(2)).await;
            match self.mode.load(Ordering::Acquire) {
                MODE_BATCH => Ok(Fetch::one(self.counter.fetch_add(1, Ordering::SeqCst))),
                MODE_EMPTY => Ok(Fetch::Batch(Vec::new())),
                _ => Ok(Fetch::Timeout),
            }
        }
    }

    fn polling(
        min: usize,
        max: usize,
        buf: usize,
    ) -> (PollingBuffer<Tail>, Arc<AtomicU8>) {
        let mode = Arc::new(AtomicU8::new(MODE_BATCH));
        let counter = Arc::new(AtomicU64::new(0));
        let factory = {
            let mode = Arc::clone(&mode);
            SpawnFn::arc(move || {
                let mode = Arc::clone(&mode);
                let counter = Arc::clone(&counter);
                async move { Ok(Tail { mode, counter }) }
            })
        };
        let buffer = PollingBuffer::new(
            factory,
            PoolConfig {
                min_instances: min,
                max_instances: max,
                ..Default::default()
            },
            BufferConfig { max_size: buf },
        );
        (buffer, mode)
    }

    #[tokio::test]
    async fn fetched_items_arrive_in_the_buffer() {
        let (buffer, _mode) = polling(1, 2, 8);

        let mut seen = Vec::new();
        for _ in 0..5 {
            let item = timeout(Duration::from_secs(2), buffer.pop())
                .await
                .expect("poll pipeline should produce items");
            seen.push(item.unwrap());
        }
        // Items are the counter sequence, possibly interleaved across runners.
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 5);

        drain_and_quit(&buffer).await;
    }

    /// Quits while draining: producers may still be landing pushes, so the
    /// drain-before-shutdown contract needs a consumer.
    async fn drain_and_quit(buffer: &PollingBuffer<Tail>) {
        let quitter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.quit().await })
        };
        let drained = {
            let buffer = buffer.clone();
            async move { while buffer.pop().await.is_some() {} }
        };
        timeout(Duration::from_secs(5), drained).await.unwrap();
        timeout(Duration::from_secs(5), quitter)
            .await
            .expect("quit should finish once drained")
            .unwrap();
    }

    #[tokio::test]
    async fn sustained_success_scales_up_to_max() {
        let (buffer, _mode) = polling(1, 3, 4);

        // Keep consuming so producers never park on backpressure.
        let consumer = {
            let buffer = buffer.clone();
            tokio::spawn(async move {
                let mut n = 0u32;
                while buffer.pop().await.is_some() {
                    n += 1;
                }
                n
            })
        };

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while buffer.pool().instance_count() < 3 && tokio::time::Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(buffer.pool().instance_count(), 3);

        buffer.quit().await;
        let consumed = consumer.await.unwrap();
        assert!(consumed > 0);
    }

    #[tokio::test]
    async fn timeouts_reap_runners_back_to_minimum() {
        let (buffer, mode) = polling(1, 3, 4);

        let consumer = {
            let buffer = buffer.clone();
            tokio::spawn(async move { while buffer.pop().await.is_some() {} })
        };

        // Grow first.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while buffer.pool().instance_count() < 3 && tokio::time::Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert!(buffer.pool().instance_count() >= 2);

        // Dry source: every poll times out, runners reap one by one.
        mode.store(MODE_TIMEOUT, Ordering::Release);
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while buffer.pool().instance_count() > 1 && tokio::time::Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(buffer.pool().instance_count(), 1);

        // Data returns: no further scale-down below the floor; the pool may
        // grow again on sustained success, but never vanishes.
        mode.store(MODE_BATCH, Ordering::Release);
        sleep(Duration::from_millis(100)).await;
        assert!(buffer.pool().instance_count() >= 1);

        buffer.quit().await;
        consumer.await.unwrap();
    }

    #[tokio::test]
    async fn empty_batches_reap_like_timeouts() {
        let (buffer, mode) = polling(1, 3, 4);
        mode.store(MODE_EMPTY, Ordering::Release);

        // Pre-grow explicitly, then watch empties shrink the pool.
        buffer.pool().scale_up().await;
        buffer.pool().scale_up().await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while buffer.pool().instance_count() > 1 && tokio::time::Instant::now() < deadline {
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(buffer.pool().instance_count(), 1);

        buffer.quit().await;
    }

    #[tokio::test]
    async fn backpressure_parks_producers_at_capacity() {
        let (buffer, _mode) = polling(1, 2, 3);

        // Nobody consumes: the buffer fills to max_size and stays there.
        sleep(Duration::from_millis(150)).await;
        assert!(buffer.len() <= buffer.max_size());
        assert_eq!(buffer.len(), buffer.max_size());

        // Draining reopens production.
        assert!(buffer.pop().await.is_some());
        drain_and_quit(&buffer).await;
    }

    #[tokio::test]
    async fn quit_drains_buffer_and_pool() {
        let (buffer, _mode) = polling(1, 2, 4);

        // Let some production happen.
        let first = timeout(Duration::from_secs(2), buffer.pop()).await.unwrap();
        assert!(first.is_some());

        let quitter = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.quit().await })
        };

        // Keep draining until the terminal signal.
        let drained = async {
            while buffer.pop().await.is_some() {}
        };
        timeout(Duration::from_secs(5), drained).await.unwrap();
        timeout(Duration::from_secs(5), quitter)
            .await
            .expect("quit should finish once drained")
            .unwrap();

        assert_eq!(buffer.pool().instance_count(), 0);
        assert_eq!(buffer.pop().await, None);
        assert!(buffer.push(99).await.is_err());
    }
}
