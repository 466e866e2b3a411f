//! Eviction Sweeper Task
//!
//! Background thread that periodically sweeps the timed cache and
//! removes entries that have not been accessed for a full period.

use std::hash::Hash;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info};

use crate::cache::TimedInner;

// == Shutdown Signal ==
/// One-way flag the sweeper idles on between passes.
///
/// The sweeper waits on the condvar with a timeout equal to the sweep
/// period, so a shutdown request wakes it immediately instead of being
/// noticed only at the next tick.
#[derive(Debug, Default)]
pub(crate) struct ShutdownSignal {
    requested: Mutex<bool>,
    changed: Condvar,
}

impl ShutdownSignal {
    /// Creates a signal in the not-requested state.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Requests shutdown and wakes the sweeper.
    pub(crate) fn request(&self) {
        let mut requested = self.requested.lock();
        *requested = true;
        drop(requested);
        self.changed.notify_all();
    }

    /// Returns true if shutdown has been requested.
    pub(crate) fn is_requested(&self) -> bool {
        *self.requested.lock()
    }

    /// Sleeps for up to `period`, returning early if shutdown is
    /// requested. Returns true if shutdown was requested.
    ///
    /// The wait loops until the deadline, so a spurious wakeup cannot
    /// trigger an early sweep pass.
    pub(crate) fn wait_for(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut requested = self.requested.lock();
        while !*requested {
            if self.changed.wait_until(&mut requested, deadline).timed_out() {
                break;
            }
        }
        *requested
    }
}

// == Spawn Sweeper ==
/// Spawns the sweeper thread for a timed cache.
///
/// The thread runs one eviction pass per period for the cache's
/// lifetime and exits when shutdown is requested. The handle is joined
/// by the cache's `shutdown()`, which guarantees no pass runs after
/// shutdown returns.
pub(crate) fn spawn_sweeper<K, V>(
    inner: Arc<TimedInner<K, V>>,
    period: Duration,
) -> JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    thread::Builder::new()
        .name("cache-sweeper".to_string())
        .spawn(move || {
            info!("starting eviction sweeper with period {:?}", period);

            loop {
                if inner.shutdown.wait_for(period) {
                    break;
                }

                let removed = inner.sweep();
                if removed > 0 {
                    info!("eviction sweep removed {} stale entries", removed);
                } else {
                    debug!("eviction sweep found no stale entries");
                }
            }

            debug!("eviction sweeper stopped");
        })
        .expect("failed to spawn sweeper thread")
}
