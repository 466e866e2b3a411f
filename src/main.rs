//! Mini Sync - demo driver
//!
//! Exercises the toolkit end to end: a producer/consumer handoff session
//! over the bounded blocking queue, then a memoized primality session
//! over the timed cache.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{ensure, Context};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_sync::{BoundedBlockingQueue, Config, TimedMemoCache};

/// Main entry point for the Mini Sync demo driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Run the producer/consumer handoff session
/// 4. Run the memoized primality session
fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini Sync demo driver");

    // Load configuration from environment variables
    let config = Config::from_env();
    info!(
        "Configuration loaded: queue_capacity={}, handoff_items={}, sweep_interval={}ms, prime_workers={}",
        config.queue_capacity, config.handoff_items, config.sweep_interval_ms, config.prime_workers
    );

    run_handoff_session(&config)?;
    run_prime_session(&config)?;

    info!("Demo driver complete");
    Ok(())
}

/// Runs the producer/consumer handoff session.
///
/// One producer thread pushes sequential integers through the shared
/// queue while one consumer thread takes them, verifying strict +1
/// ordering. At the end the queue must be fully drained.
fn run_handoff_session(config: &Config) -> anyhow::Result<()> {
    let items = config.handoff_items;
    let queue = Arc::new(BoundedBlockingQueue::new(config.queue_capacity));

    info!(
        "Handoff session: {} items through a capacity-{} queue",
        items, config.queue_capacity
    );

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || -> anyhow::Result<()> {
            for i in 0..items {
                queue.put(i).context("queue closed during put")?;
            }
            Ok(())
        })
    };

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || -> anyhow::Result<usize> {
            let mut received = 0usize;
            while received < items {
                let item = queue.take().context("queue closed during take")?;
                ensure!(
                    item == received,
                    "out-of-order item: got {}, expected {}",
                    item,
                    received
                );
                received += 1;
            }
            Ok(received)
        })
    };

    producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer panicked"))??;
    let received = consumer
        .join()
        .map_err(|_| anyhow::anyhow!("consumer panicked"))??;

    ensure!(
        received == items,
        "consumer received {} of {} items",
        received,
        items
    );
    ensure!(queue.is_empty(), "queue not drained at end of session");

    info!("Handoff session complete: {} items in strict order", received);
    Ok(())
}

/// Runs the memoized primality session.
///
/// Several worker threads repeatedly resolve the same candidates through
/// a timed cache wrapping the trial-division factor check. Repeated
/// lookups are served from the cache, which the final statistics show.
fn run_prime_session(config: &Config) -> anyhow::Result<()> {
    // Candidates checked by every worker; repetition is the point.
    const CANDIDATES: [u64; 6] = [999_983, 999_999, 1_000_003, 1_000_000, 1_000_033, 1_000_037];

    // Lookup rounds per worker.
    const ROUNDS: usize = 4;

    let cache = Arc::new(TimedMemoCache::new(
        |candidate: &u64| Ok(smallest_factor(*candidate)),
        Duration::from_millis(config.sweep_interval_ms),
    ));

    info!(
        "Prime session: {} workers, {} candidates, {} rounds",
        config.prime_workers,
        CANDIDATES.len(),
        ROUNDS
    );

    let workers: Vec<_> = (0..config.prime_workers)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || -> anyhow::Result<()> {
                for _ in 0..ROUNDS {
                    for &candidate in &CANDIDATES {
                        let factor = cache.get(&candidate).context("prime lookup failed")?;
                        if factor == 0 {
                            debug!("worker {}: {} is prime", worker, candidate);
                        } else {
                            debug!(
                                "worker {}: {} has smallest factor {}",
                                worker, candidate, factor
                            );
                        }
                    }
                }
                Ok(())
            })
        })
        .collect();

    for worker in workers {
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("prime worker panicked"))??;
    }

    let stats = cache.stats();
    info!(
        "Prime session stats: {}",
        serde_json::to_string(&stats).context("failed to serialize stats")?
    );
    cache.shutdown();

    Ok(())
}

/// Returns 0 if `n` is prime, otherwise its smallest factor.
///
/// Deliberately brute force: the demo wants an expensive pure function
/// that is worth memoizing.
fn smallest_factor(n: u64) -> u64 {
    if n > 3 {
        let mut factor = 2;
        while factor <= n / 2 {
            if n % factor == 0 {
                return factor;
            }
            factor += 1;
        }
    }
    0
}
