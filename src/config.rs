//! Configuration Module
//!
//! Handles loading the demo driver's configuration from environment
//! variables.

use std::env;

/// Demo driver configuration parameters.
///
/// All values can be configured via environment variables with sensible
/// defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the handoff queue
    pub queue_capacity: usize,
    /// Number of items the producer pushes through the queue
    pub handoff_items: usize,
    /// Eviction sweep interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Number of worker threads querying the memoized primality test
    pub prime_workers: usize,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `QUEUE_CAPACITY` - Handoff queue capacity (default: 10)
    /// - `HANDOFF_ITEMS` - Items pushed through the queue (default: 100000)
    /// - `SWEEP_INTERVAL_MS` - Eviction sweep interval (default: 100)
    /// - `PRIME_WORKERS` - Primality worker threads (default: 4)
    pub fn from_env() -> Self {
        Self {
            queue_capacity: env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            handoff_items: env::var("HANDOFF_ITEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100_000),
            sweep_interval_ms: env::var("SWEEP_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(100),
            prime_workers: env::var("PRIME_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            handoff_items: 100_000,
            sweep_interval_ms: 100,
            prime_workers: 4,
        }
    }
}
