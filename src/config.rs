//! # Runtime configuration for executor, buffer, and pool.
//!
//! Provides [`ExecutorConfig`], [`BufferConfig`], and [`PoolConfig`].
//!
//! All fields are public for flexibility. Components read them through the
//! `*_clamped`/`normalized` accessors so invalid combinations (zero
//! parallelism, inverted bounds, thresholds outside `[0, 1]`) degrade to the
//! nearest sane value instead of sprinkling sentinel checks across the
//! codebase.

use std::time::Duration;

/// Configuration for a bounded-parallel executor run.
///
/// ## Field semantics
/// - `parallel`: target number of jobs in flight (min 1; clamped)
/// - `continue_on_error`: keep starting jobs after a failure
/// - `store_output`: collect job outputs into [`RunReport::results`](crate::RunReport)
/// - `fail_on_error`: resolve the run handle with [`RunError`](crate::RunError)
///   when any errors were collected
/// - `max_errors`: cap on retained errors (`None` = unbounded; excess dropped)
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
    /// Target number of jobs kept in flight.
    ///
    /// The executor never starts a job while `parallel` jobs are already
    /// running. Values below 1 are treated as 1.
    pub parallel: usize,

    /// Whether to keep starting new jobs after a job error.
    ///
    /// Jobs already in flight always run to completion either way.
    pub continue_on_error: bool,

    /// Whether to append job outputs to the report's `results`.
    pub store_output: bool,

    /// Whether collected errors fail the run handle.
    ///
    /// - `true` → the handle resolves to `Err(RunError)` carrying the report
    /// - `false` → the handle resolves to `Ok(report)` with `errors` populated
    pub fail_on_error: bool,

    /// Maximum number of errors retained in the report.
    ///
    /// `None` = unbounded. Errors beyond the cap are silently dropped; the
    /// run outcome is unaffected.
    pub max_errors: Option<usize>,
}

impl ExecutorConfig {
    /// Returns the in-flight target clamped to a minimum of 1.
    #[inline]
    pub fn parallel_clamped(&self) -> usize {
        self.parallel.max(1)
    }

    /// Returns true if another error may be recorded given `current` retained.
    #[inline]
    pub fn may_record_error(&self, current: usize) -> bool {
        match self.max_errors {
            None => true,
            Some(cap) => current < cap,
        }
    }
}

impl Default for ExecutorConfig {
    /// Default configuration:
    ///
    /// - `parallel = 1` (sequential)
    /// - `continue_on_error = true`
    /// - `store_output = true`
    /// - `fail_on_error = true`
    /// - `max_errors = None` (unbounded)
    fn default() -> Self {
        Self {
            parallel: 1,
            continue_on_error: true,
            store_output: true,
            fail_on_error: true,
            max_errors: None,
        }
    }
}

/// Configuration for [`AsyncBuffer`](crate::AsyncBuffer).
#[derive(Clone, Debug)]
pub struct BufferConfig {
    /// Maximum number of buffered items.
    ///
    /// `push` suspends while the buffer holds this many items. Values below
    /// 1 are treated as 1.
    pub max_size: usize,
}

impl BufferConfig {
    /// Returns the capacity clamped to a minimum of 1.
    #[inline]
    pub fn max_size_clamped(&self) -> usize {
        self.max_size.max(1)
    }
}

impl Default for BufferConfig {
    /// Default configuration: `max_size = 100`.
    fn default() -> Self {
        Self { max_size: 100 }
    }
}

/// Configuration for [`ScalingPool`](crate::ScalingPool).
///
/// ## Field semantics
/// - `min_instances` / `max_instances`: steady-state instance bounds
/// - `scale_down_at` / `scale_up_at`: utilization thresholds in `[0, 1]`
/// - `scale_interval`: auto-scale tick period
/// - `responsive_scale`: create an instance immediately on a claim miss
/// - `auto_scale`: enable the periodic tick; when off, `responsive_scale` is
///   also disabled, but startup still converges to `min_instances`
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Lower bound on pooled instances once steady state is reached.
    pub min_instances: usize,

    /// Upper bound on pooled instances.
    pub max_instances: usize,

    /// Utilization below which the pool shrinks by one per tick.
    pub scale_down_at: f64,

    /// Utilization above which the pool grows by one per tick.
    pub scale_up_at: f64,

    /// Period of the utilization tick.
    pub scale_interval: Duration,

    /// Whether a claim miss below `max_instances` spawns a new instance
    /// immediately instead of waiting for a release or a tick.
    ///
    /// Only effective while `auto_scale` is on.
    pub responsive_scale: bool,

    /// Whether the periodic utilization tick runs at all.
    pub auto_scale: bool,
}

impl PoolConfig {
    /// Returns `(min, max)` with `max` raised to at least `min.max(1)`.
    #[inline]
    pub fn instance_bounds(&self) -> (usize, usize) {
        let min = self.min_instances;
        let max = self.max_instances.max(min).max(1);
        (min, max)
    }

    /// Returns `(scale_down_at, scale_up_at)` clamped into `[0, 1]` with
    /// the down threshold kept strictly below the up threshold.
    #[inline]
    pub fn thresholds(&self) -> (f64, f64) {
        let up = self.scale_up_at.clamp(0.0, 1.0);
        let down = self.scale_down_at.clamp(0.0, 1.0).min(up);
        (down, up)
    }

    /// Returns the tick period clamped to a minimum of 10ms.
    #[inline]
    pub fn tick_interval(&self) -> Duration {
        self.scale_interval.max(Duration::from_millis(10))
    }

    /// Returns true if claim misses may trigger an immediate scale-up.
    #[inline]
    pub fn responsive_enabled(&self) -> bool {
        self.responsive_scale && self.auto_scale
    }
}

impl Default for PoolConfig {
    /// Default configuration:
    ///
    /// - `min_instances = 1`, `max_instances = 16`
    /// - `scale_down_at = 0.4`, `scale_up_at = 0.8`
    /// - `scale_interval = 1s`
    /// - `responsive_scale = true`, `auto_scale = true`
    fn default() -> Self {
        Self {
            min_instances: 1,
            max_instances: 16,
            scale_down_at: 0.4,
            scale_up_at: 0.8,
            scale_interval: Duration::from_secs(1),
            responsive_scale: true,
            auto_scale: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_defaults() {
        let cfg = ExecutorConfig::default();
        assert_eq!(cfg.parallel, 1);
        assert!(cfg.continue_on_error);
        assert!(cfg.store_output);
        assert!(cfg.fail_on_error);
        assert!(cfg.max_errors.is_none());
    }

    #[test]
    fn parallel_is_clamped() {
        let cfg = ExecutorConfig {
            parallel: 0,
            ..Default::default()
        };
        assert_eq!(cfg.parallel_clamped(), 1);
    }

    #[test]
    fn error_cap() {
        let cfg = ExecutorConfig {
            max_errors: Some(2),
            ..Default::default()
        };
        assert!(cfg.may_record_error(0));
        assert!(cfg.may_record_error(1));
        assert!(!cfg.may_record_error(2));

        let unbounded = ExecutorConfig::default();
        assert!(unbounded.may_record_error(usize::MAX - 1));
    }

    #[test]
    fn buffer_defaults_and_clamp() {
        assert_eq!(BufferConfig::default().max_size_clamped(), 100);
        assert_eq!(BufferConfig { max_size: 0 }.max_size_clamped(), 1);
    }

    #[test]
    fn pool_bounds_are_normalized() {
        let cfg = PoolConfig {
            min_instances: 8,
            max_instances: 2,
            ..Default::default()
        };
        assert_eq!(cfg.instance_bounds(), (8, 8));

        let cfg = PoolConfig {
            min_instances: 0,
            max_instances: 0,
            ..Default::default()
        };
        assert_eq!(cfg.instance_bounds(), (0, 1));
    }

    #[test]
    fn pool_thresholds_are_ordered() {
        let cfg = PoolConfig {
            scale_down_at: 0.9,
            scale_up_at: 0.5,
            ..Default::default()
        };
        let (down, up) = cfg.thresholds();
        assert!(down <= up);
        assert_eq!(up, 0.5);
    }

    #[test]
    fn responsive_requires_auto_scale() {
        let cfg = PoolConfig {
            auto_scale: false,
            responsive_scale: true,
            ..Default::default()
        };
        assert!(!cfg.responsive_enabled());
    }
}
