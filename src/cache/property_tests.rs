//! Property-Based Tests for the Cache Module
//!
//! Uses proptest to verify the memoization and bookkeeping properties.

use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::MemoCache;
use crate::error::CacheError;

// == Strategies ==
/// Generates lookup sequences with plenty of repeated keys.
fn key_sequence_strategy() -> impl Strategy<Value = Vec<u16>> {
    prop::collection::vec(0u16..32, 1..100)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // For any key, the cache returns exactly what the compute function
    // would return when called directly.
    #[test]
    fn prop_get_matches_compute(keys in prop::collection::vec(any::<u32>(), 1..50)) {
        let cache = MemoCache::new(|key: &u32| Ok(u64::from(*key) * 3 + 1));

        for key in keys {
            prop_assert_eq!(cache.get(&key).unwrap(), u64::from(key) * 3 + 1);
        }
    }

    // For any lookup sequence, misses equal the number of distinct keys
    // (each computed exactly once) and hits make up the remainder.
    #[test]
    fn prop_stats_accuracy(keys in key_sequence_strategy()) {
        let cache = MemoCache::new(|key: &u16| Ok(*key));

        let mut distinct = HashSet::new();
        for key in &keys {
            cache.get(key).unwrap();
            distinct.insert(*key);
        }

        let stats = cache.stats();
        prop_assert_eq!(stats.misses, distinct.len() as u64, "one miss per distinct key");
        prop_assert_eq!(stats.hits, (keys.len() - distinct.len()) as u64, "hits are the rest");
        prop_assert_eq!(stats.total_entries, distinct.len());
    }

    // A failing pass never poisons the cache: after the compute function
    // recovers, every key computes successfully.
    #[test]
    fn prop_failures_are_not_cached(keys in key_sequence_strategy()) {
        let failing = Arc::new(AtomicBool::new(true));

        let flag = Arc::clone(&failing);
        let cache = MemoCache::new(move |key: &u16| {
            if flag.load(Ordering::SeqCst) {
                Err(CacheError::ComputeFailed("transient".to_string()))
            } else {
                Ok(*key as u32 + 7)
            }
        });

        for key in &keys {
            prop_assert!(cache.get(key).is_err());
        }
        prop_assert!(cache.is_empty(), "failed computations must leave no entries");

        failing.store(false, Ordering::SeqCst);
        for key in &keys {
            prop_assert_eq!(cache.get(key).unwrap(), *key as u32 + 7);
        }
    }
}
