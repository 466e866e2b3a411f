//! Memoizing Cache Module
//!
//! Maps a key to the value produced by a compute function. A value that
//! has been computed before is returned from the cache rather than being
//! computed again, and concurrent callers for the same key share a single
//! in-flight computation.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::cache::slot::ComputeSlot;
use crate::cache::stats::StatsRecorder;
use crate::cache::{CacheStats, ComputeFn};
use crate::error::Result;

// == Memo Cache ==
/// Concurrent memoizing cache with at-most-once computation per key.
///
/// The map is sharded, so distinct keys never contend on a common lock;
/// the per-key slot is the unit of atomicity. Installing a slot reserves
/// the computation: exactly one caller runs the compute function, every
/// other caller for that key waits on the same slot and receives the
/// same value.
pub struct MemoCache<K, V> {
    /// Key to in-flight-or-completed slot
    map: DashMap<K, Arc<ComputeSlot<V>>>,
    /// Produces a value for a key; runs outside any map lock
    compute: ComputeFn<K, V>,
    /// Hit/miss counters
    stats: StatsRecorder,
}

impl<K, V> MemoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates a cache over the given compute function.
    pub fn new(compute: impl Fn(&K) -> Result<V> + Send + Sync + 'static) -> Self {
        Self {
            map: DashMap::new(),
            compute: Box::new(compute),
            stats: StatsRecorder::new(),
        }
    }

    // == Get ==
    /// Returns the value for `key`, computing it on first access.
    ///
    /// A present key is served without invoking the compute function;
    /// joining a computation that is still in flight counts as a hit.
    /// On a miss, exactly one caller among any number of concurrent
    /// callers runs the compute function. A failed computation is not
    /// cached: the slot is cleared before waiters are woken, so a later
    /// `get` retries.
    pub fn get(&self, key: &K) -> Result<V> {
        // Fast path: the key is already present.
        if let Some(entry) = self.map.get(key) {
            let slot = Arc::clone(entry.value());
            drop(entry);
            self.stats.record_hit();
            debug!("value was cached");
            return slot.wait();
        }

        // Miss path: race to install the slot. The entry API inserts
        // atomically under the shard lock, so exactly one caller wins.
        let (slot, is_leader) = match self.map.entry(key.clone()) {
            Entry::Occupied(occupied) => (Arc::clone(occupied.get()), false),
            Entry::Vacant(vacant) => {
                let slot = Arc::new(ComputeSlot::new());
                vacant.insert(Arc::clone(&slot));
                (slot, true)
            }
        };

        if !is_leader {
            // Another caller beat us to the reservation; share its result.
            self.stats.record_hit();
            debug!("value was cached");
            return slot.wait();
        }

        self.stats.record_miss();
        self.compute_and_publish(key, &slot)
    }

    // == Length ==
    /// Returns the current number of cached entries (advisory).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    // == Stats ==
    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.map.len())
    }

    // == Compute and Publish ==
    /// Runs the compute function as the slot's owner and publishes the
    /// outcome, clearing the slot on failure so later calls can retry.
    fn compute_and_publish(&self, key: &K, slot: &Arc<ComputeSlot<V>>) -> Result<V> {
        let mut guard = FlightGuard {
            map: &self.map,
            key,
            slot,
            armed: true,
        };
        let outcome = (self.compute)(key);
        guard.armed = false;
        drop(guard);

        match outcome {
            Ok(value) => {
                slot.complete(value.clone());
                Ok(value)
            }
            Err(error) => {
                // Remove the slot before waking waiters so the failure
                // is never served from the cache.
                self.map.remove_if(key, |_, current| Arc::ptr_eq(current, slot));
                slot.fail(error.to_string());
                debug!("compute failed, key removed from cache");
                Err(error)
            }
        }
    }
}

// == Flight Guard ==
/// Clears the in-flight slot if the compute function unwinds, so no
/// caller can hang on a permanently Computing slot.
struct FlightGuard<'a, K: Eq + Hash, V> {
    map: &'a DashMap<K, Arc<ComputeSlot<V>>>,
    key: &'a K,
    slot: &'a Arc<ComputeSlot<V>>,
    armed: bool,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<'_, K, V> {
    fn drop(&mut self) {
        if self.armed {
            self.map
                .remove_if(self.key, |_, current| Arc::ptr_eq(current, self.slot));
            self.slot.fail("compute function panicked".to_string());
        }
    }
}
