//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the scheduler runtime.
//!
//! Config is used in two ways:
//! 1. **Scheduler creation**: `SchedulerBuilder::new(engine).with_config(config)`
//! 2. **Pool defaults**: pools created without explicit limits inherit
//!    `default_min_workers` / `default_max_workers` / `default_retention`.
//!
//! ## Field semantics
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
//! - `sweep_interval`: cadence of the retention sweep
//! - `resize_wait`: bounded wait when shrinking a pool's admission gate
//! - `default_max_workers`: derived from logical CPU count at construction

use std::time::Duration;

/// Global configuration for the scheduler runtime.
///
/// Controls event delivery, retention sweeping, gate-resize patience, and
/// the defaults new pools inherit.
#[derive(Clone, Debug)]
pub struct Config {
    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,

    /// How often the retention sweep evicts expired terminal tasks.
    pub sweep_interval: Duration,

    /// Maximum time a gate shrink waits for running tasks to release permits
    /// before failing with a structured error.
    pub resize_wait: Duration,

    /// Minimum worker-context count for pools created without an explicit value.
    pub default_min_workers: usize,

    /// Maximum worker-context count for pools created without an explicit value.
    pub default_max_workers: usize,

    /// How long completed tasks remain queryable in pools created without an
    /// explicit retention.
    pub default_retention: Duration,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    ///
    /// The `Bus` should use this value to avoid constructing an invalid channel.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `sweep_interval = 60s`
    /// - `resize_wait = 30s`
    /// - `default_min_workers = 1`
    /// - `default_max_workers = max(2, logical cpus)`
    /// - `default_retention = 30min`
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            bus_capacity: 1024,
            sweep_interval: Duration::from_secs(60),
            resize_wait: Duration::from_secs(30),
            default_min_workers: 1,
            default_max_workers: cpus.max(2),
            default_retention: Duration::from_secs(30 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.default_min_workers >= 1);
        assert!(cfg.default_max_workers >= 2);
        assert!(cfg.default_max_workers >= cfg.default_min_workers);
        assert_eq!(cfg.default_retention, Duration::from_secs(1800));
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
