//! # Auto-scaler: utilization metering and the periodic tick.
//!
//! Scaling policy, evaluated once per tick while no scale is in flight:
//!
//! ```text
//! tick:
//!   ├─► sample utilization = claimed-time / (interval × instances)
//!   ├─► publish Usage
//!   ├─► instances < min            → scale up, re-tick immediately
//!   ├─► usage > scale_up_at, < max → scale up by one
//!   └─► usage < scale_down_at, > min → scale down by one
//! ```
//!
//! ## Rules
//! - Still-claimed slots contribute `now − claimed_at` and have their
//!   timestamp reset, so long claims are charged to every interval they
//!   span. The accumulator resets after each sample.
//! - Below-minimum convergence does not wait for the next interval; it
//!   loops until the floor is reached (or the factory keeps failing, in
//!   which case it backs off to the next tick).
//! - With `auto_scale` off there is no periodic tick, but startup still
//!   converges to `min_instances` once.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};

use crate::events::PoolEventKind;
use crate::pool::pool::ScalingPool;
use crate::runners::Runner;

impl<R: Runner> ScalingPool<R> {
    /// Starts the pool's background scaling.
    ///
    /// Call exactly once, after any `Available`-event subscribers are in
    /// place. With `auto_scale` enabled this runs the periodic tick (whose
    /// first firing also converges to `min_instances`); otherwise only the
    /// one-shot minimum convergence runs.
    pub fn spawn_scaler(&self) {
        let pool = self.clone();
        if self.inner.cfg.auto_scale {
            let token = self.inner.tick_token.clone();
            tokio::spawn(async move {
                let mut ticker = interval(pool.inner.cfg.tick_interval());
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    pool.tick().await;
                }
            });
        } else {
            tokio::spawn(async move { pool.converge_to_min().await });
        }
    }

    /// One evaluation of the scaling policy.
    pub(crate) async fn tick(&self) {
        let (usage, count) = self.sample_usage();
        self.inner.bus.publish(PoolEventKind::Usage {
            utilization: usage,
            instances: count,
        });

        if self.inner.scaling.load(Ordering::Acquire) || self.is_quitting() {
            return;
        }

        let (down_at, up_at) = self.inner.cfg.thresholds();
        if count < self.min_instances() {
            self.converge_to_min().await;
        } else if usage > up_at && count < self.max_instances() {
            self.scale_up().await;
        } else if usage < down_at && count > self.min_instances() {
            self.scale_down().await;
        }
    }

    /// Scales up until the floor is reached, without waiting for ticks.
    ///
    /// Stops early if the factory fails (the count did not grow); the next
    /// tick retries.
    pub(crate) async fn converge_to_min(&self) {
        loop {
            if self.is_quitting() {
                return;
            }
            let count = self.instance_count();
            if count >= self.min_instances() {
                return;
            }
            self.scale_up().await;
            if self.instance_count() <= count {
                return;
            }
        }
    }

    /// Samples utilization over the interval and resets the accumulator.
    fn sample_usage(&self) -> (f64, usize) {
        let mut st = self.lock_state();
        let now = Instant::now();
        let mut acc = st.usage_acc;
        for slot in st.slots.iter_mut() {
            if let Some(t) = slot.claimed_at {
                acc += now.saturating_duration_since(t);
                slot.claimed_at = Some(now);
            }
        }
        st.usage_acc = Duration::ZERO;
        let count = st.slots.len();

        let denom = self.inner.cfg.tick_interval().as_secs_f64() * count as f64;
        let usage = if denom <= 0.0 {
            0.0
        } else {
            (acc.as_secs_f64() / denom).clamp(0.0, 1.0)
        };
        (usage, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::time::sleep;

    use crate::config::PoolConfig;
    use crate::error::TaskError;
    use crate::runners::SpawnFn;

    struct Conn;

    #[async_trait]
    impl Runner for Conn {
        async fn quit(&self) -> Result<(), TaskError> {
            Ok(())
        }
    }

    fn pool_with(cfg: PoolConfig) -> ScalingPool<Conn> {
        ScalingPool::new(SpawnFn::arc(|| async { Ok(Conn) }), cfg)
    }

    #[tokio::test]
    async fn startup_converges_to_minimum_without_auto_scale() {
        let pool = pool_with(PoolConfig {
            min_instances: 3,
            max_instances: 8,
            auto_scale: false,
            responsive_scale: false,
            ..Default::default()
        });
        pool.spawn_scaler();

        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.instance_count(), 3);

        // No periodic tick: the count stays put.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.instance_count(), 3);
        pool.quit().await;
    }

    #[tokio::test]
    async fn first_tick_converges_to_minimum_immediately() {
        let pool = pool_with(PoolConfig {
            min_instances: 2,
            max_instances: 4,
            scale_interval: Duration::from_secs(60),
            responsive_scale: false,
            ..Default::default()
        });
        pool.spawn_scaler();

        // The first interval tick fires at once; no 60s wait.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.instance_count(), 2);
        pool.quit().await;
    }

    #[tokio::test]
    async fn high_utilization_scales_up() {
        let pool = pool_with(PoolConfig {
            min_instances: 1,
            max_instances: 3,
            scale_interval: Duration::from_millis(30),
            scale_up_at: 0.5,
            scale_down_at: 0.1,
            responsive_scale: false,
            ..Default::default()
        });
        pool.spawn_scaler();
        sleep(Duration::from_millis(40)).await;

        // Hold the only instance claimed across several intervals.
        let conn = pool.claim().await.unwrap();
        sleep(Duration::from_millis(120)).await;
        assert!(pool.instance_count() >= 2);

        pool.release(&conn).unwrap();
        pool.quit().await;
    }

    #[tokio::test]
    async fn idle_pool_scales_back_down_to_minimum() {
        let pool = pool_with(PoolConfig {
            min_instances: 1,
            max_instances: 4,
            scale_interval: Duration::from_millis(30),
            responsive_scale: false,
            ..Default::default()
        });
        pool.spawn_scaler();
        pool.scale_up().await;
        pool.scale_up().await;
        pool.scale_up().await;
        assert!(pool.instance_count() >= 3);

        // Nothing claimed: utilization 0 < scale_down_at, one removal per tick.
        sleep(Duration::from_millis(250)).await;
        assert_eq!(pool.instance_count(), 1);
        pool.quit().await;
    }

    #[tokio::test]
    async fn usage_events_carry_utilization() {
        let pool = pool_with(PoolConfig {
            min_instances: 1,
            max_instances: 2,
            scale_interval: Duration::from_millis(25),
            responsive_scale: false,
            ..Default::default()
        });
        let mut rx = pool.subscribe();
        pool.spawn_scaler();

        let mut ticks = 0;
        while ticks < 3 {
            if let Ok(ev) = rx.recv().await {
                if let PoolEventKind::Usage { utilization, .. } = ev.kind {
                    assert!((0.0..=1.0).contains(&utilization));
                    ticks += 1;
                }
            }
        }
        pool.quit().await;
    }

    #[tokio::test]
    async fn factory_failure_does_not_spin_convergence() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let factory = {
            let attempts = Arc::clone(&attempts);
            SpawnFn::arc(move || {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err::<Conn, _>(TaskError::fail("down")) }
            })
        };
        let pool = ScalingPool::new(
            factory,
            PoolConfig {
                min_instances: 2,
                max_instances: 4,
                auto_scale: false,
                responsive_scale: false,
                ..Default::default()
            },
        );
        pool.spawn_scaler();
        sleep(Duration::from_millis(50)).await;

        // One failed attempt, then the convergence pass gave up.
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(pool.instance_count(), 0);
        pool.quit().await;
    }
}
