//! Timed Memoizing Cache Module
//!
//! Memoizing cache that additionally evicts entries not accessed for a
//! full sweep period. Staleness is tracked with a per-entry access
//! counter, not timestamps: the periodic sweep marks each entry down to a
//! sentinel and removes it one period later only if no access has moved
//! the counter since.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::slot::ComputeSlot;
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheStats, ComputeFn};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_sweeper, ShutdownSignal};

// == Access Counter Protocol ==
/// Access count assigned to a freshly created entry. Strictly above the
/// sentinel, so the first sweep to observe the entry can only mark it;
/// eviction always requires one further untouched period.
const FRESH: u64 = 2;

/// Sentinel count meaning "not accessed since the last sweep marked it".
const NOT_ACCESSED: u64 = 1;

// == Timed Entry ==
/// A compute slot plus the access counter driving eviction.
#[derive(Debug)]
pub(crate) struct TimedEntry<V> {
    /// Shared completion handle for this key's computation
    pub(crate) slot: ComputeSlot<V>,
    /// Bumped on every hit; reset to the sentinel by the sweep
    pub(crate) access: AtomicU64,
}

// == Timed Inner ==
/// State shared between the cache handle and the sweeper thread.
pub(crate) struct TimedInner<K, V> {
    /// Key to entry; the shard lock serializes hit-bumps and removal
    map: DashMap<K, Arc<TimedEntry<V>>>,
    /// Produces a value for a key; runs outside any map lock
    compute: ComputeFn<K, V>,
    /// Hit/miss/eviction counters
    stats: StatsRecorder,
    /// Signalled by `shutdown()`; wakes the sweeper immediately
    pub(crate) shutdown: ShutdownSignal,
}

impl<K, V> TimedInner<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Sweep ==
    /// Runs one eviction pass over every entry.
    ///
    /// An entry still at the sentinel from the previous pass has been
    /// idle for a full period and is removed; the removal re-checks the
    /// counter under the shard lock, so a hit that slipped in first
    /// always wins. Any other entry is marked down to the sentinel,
    /// unless a concurrent access already pushed the counter past the
    /// value observed here.
    ///
    /// Returns the number of entries removed.
    pub(crate) fn sweep(&self) -> usize {
        // Snapshot the keys first; removing while iterating would
        // deadlock on the shard locks.
        let keys: Vec<K> = self.map.iter().map(|entry| entry.key().clone()).collect();

        let mut removed = 0;
        for key in keys {
            let entry = match self.map.get(&key) {
                Some(entry) => Arc::clone(entry.value()),
                None => continue,
            };

            let observed = entry.access.load(Ordering::SeqCst);
            if observed == NOT_ACCESSED {
                let evicted = self
                    .map
                    .remove_if(&key, |_, current| {
                        current.access.load(Ordering::SeqCst) == NOT_ACCESSED
                    })
                    .is_some();
                if evicted {
                    self.stats.record_eviction();
                    removed += 1;
                }
            } else {
                // Mark for the next pass; keep whatever a racing access
                // wrote if the counter moved past the observed value.
                let _ = entry.access.fetch_update(
                    Ordering::SeqCst,
                    Ordering::SeqCst,
                    |current| {
                        if current > observed {
                            None
                        } else {
                            Some(NOT_ACCESSED)
                        }
                    },
                );
            }
        }
        removed
    }

    // == Compute and Publish ==
    /// Runs the compute function as the entry's owner and publishes the
    /// outcome, clearing the entry on failure so later calls can retry.
    fn compute_and_publish(&self, key: &K, entry: &Arc<TimedEntry<V>>) -> Result<V> {
        let mut guard = FlightGuard {
            map: &self.map,
            key,
            entry,
            armed: true,
        };
        let outcome = (self.compute)(key);
        guard.armed = false;
        drop(guard);

        match outcome {
            Ok(value) => {
                entry.slot.complete(value.clone());
                Ok(value)
            }
            Err(error) => {
                self.map
                    .remove_if(key, |_, current| Arc::ptr_eq(current, entry));
                entry.slot.fail(error.to_string());
                debug!("compute failed, key removed from cache");
                Err(error)
            }
        }
    }
}

// == Flight Guard ==
/// Clears the in-flight entry if the compute function unwinds, so no
/// caller can hang on a permanently Computing slot.
struct FlightGuard<'a, K: Eq + Hash, V> {
    map: &'a DashMap<K, Arc<TimedEntry<V>>>,
    key: &'a K,
    entry: &'a Arc<TimedEntry<V>>,
    armed: bool,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.armed {
            self.map
                .remove_if(self.key, |_, current| Arc::ptr_eq(current, self.entry));
            self.entry
                .slot
                .fail("compute function panicked".to_string());
        }
    }
}

// == Timed Memo Cache ==
/// Memoizing cache whose entries expire after a full sweep period
/// without access.
///
/// A dedicated sweeper thread runs at a fixed rate for the cache's
/// lifetime and is stopped by `shutdown()` (or by dropping the cache).
/// Every entry is guaranteed one full idle period of grace before it
/// can be evicted, and an entry accessed at least once per period is
/// never evicted.
pub struct TimedMemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Shared with the sweeper thread
    inner: Arc<TimedInner<K, V>>,
    /// Join handle, taken by the first `shutdown()` call
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<K, V> TimedMemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a cache over the given compute function and starts the
    /// sweeper with the given period.
    ///
    /// # Panics
    /// Panics if `period` is zero.
    pub fn new(
        compute: impl Fn(&K) -> Result<V> + Send + Sync + 'static,
        period: Duration,
    ) -> Self {
        assert!(!period.is_zero(), "sweep period must be non-zero");

        let inner = Arc::new(TimedInner {
            map: DashMap::new(),
            compute: Box::new(compute),
            stats: StatsRecorder::new(),
            shutdown: ShutdownSignal::new(),
        });
        let sweeper = spawn_sweeper(Arc::clone(&inner), period);

        Self {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    // == Get ==
    /// Returns the value for `key`, computing it on first access.
    ///
    /// Every hit bumps the entry's access counter, which is what keeps
    /// the entry alive across sweep passes. The bump happens while the
    /// map shard guard is held, so it serializes with the sweep's
    /// removal check for the same key.
    pub fn get(&self, key: &K) -> Result<V> {
        if self.inner.shutdown.is_requested() {
            return Err(CacheError::ShutDown);
        }

        // Fast path: the key is already present.
        if let Some(found) = self.inner.map.get(key) {
            let entry = Arc::clone(found.value());
            entry.access.fetch_add(1, Ordering::SeqCst);
            drop(found);
            self.inner.stats.record_hit();
            debug!("value was cached");
            return entry.slot.wait();
        }

        // Miss path: race to install the entry; exactly one caller wins.
        let (entry, is_leader) = match self.inner.map.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let entry = Arc::clone(occupied.get());
                entry.access.fetch_add(1, Ordering::SeqCst);
                (entry, false)
            }
            Entry::Vacant(vacant) => {
                let entry = Arc::new(TimedEntry {
                    slot: ComputeSlot::new(),
                    access: AtomicU64::new(FRESH),
                });
                vacant.insert(Arc::clone(&entry));
                (entry, true)
            }
        };

        if !is_leader {
            self.inner.stats.record_hit();
            debug!("value was cached");
            return entry.slot.wait();
        }

        self.inner.stats.record_miss();
        self.inner.compute_and_publish(key, &entry)
    }

    // == Length ==
    /// Returns the current number of cached entries (advisory).
    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot(self.inner.map.len())
    }

    // == Shutdown ==
    /// Stops the sweeper and releases every entry.
    ///
    /// Idempotent: only the first call finds a sweeper to stop. No sweep
    /// pass runs after this returns, and subsequent `get` calls fail
    /// with `CacheError::ShutDown`.
    pub fn shutdown(&self) {
        let handle = self.sweeper.lock().take();
        if let Some(handle) = handle {
            self.inner.shutdown.request();
            let _ = handle.join();
            self.inner.map.clear();
            debug!("timed cache shut down");
        }
    }
}

impl<K, V> Drop for TimedMemoCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.shutdown();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn counting_cache(
        invocations: &Arc<AtomicUsize>,
        period: Duration,
    ) -> TimedMemoCache<u64, u64> {
        let counter = Arc::clone(invocations);
        TimedMemoCache::new(
            move |key: &u64| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(key * 2)
            },
            period,
        )
    }

    #[test]
    fn test_unaccessed_entry_is_evicted_after_two_periods() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(&invocations, Duration::from_millis(50));

        assert_eq!(cache.get(&3).unwrap(), 6);
        assert_eq!(cache.len(), 1);

        // First pass marks, second pass removes.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(cache.len(), 0);
        assert!(cache.stats().evictions >= 1);

        // The next lookup recomputes.
        assert_eq!(cache.get(&3).unwrap(), 6);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);

        cache.shutdown();
    }

    #[test]
    fn test_accessed_entry_survives_sweeps() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(&invocations, Duration::from_millis(100));

        // Access every half period for several periods.
        for _ in 0..10 {
            assert_eq!(cache.get(&4).unwrap(), 8);
            thread::sleep(Duration::from_millis(50));
        }

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);

        cache.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(&invocations, Duration::from_millis(50));

        cache.get(&1).unwrap();
        cache.shutdown();
        cache.shutdown();

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.get(&1).unwrap_err(), CacheError::ShutDown);
    }

    #[test]
    fn test_no_sweep_fires_after_shutdown() {
        let invocations = Arc::new(AtomicUsize::new(0));
        let cache = counting_cache(&invocations, Duration::from_millis(50));

        cache.get(&1).unwrap();
        cache.shutdown();
        let evictions_at_shutdown = cache.stats().evictions;

        // Long enough for several would-be passes.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(cache.stats().evictions, evictions_at_shutdown);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let cache: TimedMemoCache<u64, u64> = TimedMemoCache::new(
            |_key: &u64| Err(CacheError::ComputeFailed("nope".to_string())),
            Duration::from_millis(100),
        );

        assert!(cache.get(&9).is_err());
        assert!(cache.is_empty());

        cache.shutdown();
    }
}
