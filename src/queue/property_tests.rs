//! Property-Based Tests for the Queue Module
//!
//! Uses proptest to verify the FIFO, capacity, and conservation properties
//! against a VecDeque reference model.

use proptest::prelude::*;
use std::collections::VecDeque;

use crate::queue::BoundedBlockingQueue;

// == Strategies ==
/// Generates a sequence of intended operations; `true` means put,
/// `false` means take.
fn op_sequence_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    // For any single-threaded sequence of put/take operations the queue
    // behaves exactly like a FIFO VecDeque model: same length at every
    // step, same removal order, and the length never leaves 0..=capacity.
    #[test]
    fn prop_fifo_matches_model(ops in op_sequence_strategy(), capacity in 1usize..8) {
        let queue = BoundedBlockingQueue::new(capacity);
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut next = 0u32;

        for want_put in ops {
            // Flip an operation that would block; this harness is
            // single-threaded, so a blocked call would never wake.
            let do_put = if queue.len() == capacity {
                false
            } else if queue.is_empty() {
                true
            } else {
                want_put
            };

            if do_put {
                queue.put(next).unwrap();
                model.push_back(next);
                next += 1;
            } else {
                let taken = queue.take().unwrap();
                let expected = model.pop_front().unwrap();
                prop_assert_eq!(taken, expected, "FIFO order violated");
            }

            prop_assert!(queue.len() <= capacity, "capacity bound violated");
            prop_assert_eq!(queue.len(), model.len(), "length diverged from model");
        }

        // Conservation: draining returns every remaining item, in order,
        // with nothing lost and nothing duplicated.
        while let Some(expected) = model.pop_front() {
            prop_assert_eq!(queue.take().unwrap(), expected);
        }
        prop_assert!(queue.is_empty());
    }

    // Closing at an arbitrary point releases nothing silently: the items
    // already buffered still drain in insertion order before take fails.
    #[test]
    fn prop_close_preserves_buffered_items(
        prefill in prop::collection::vec(any::<u16>(), 0..8)
    ) {
        let queue = BoundedBlockingQueue::new(8);

        for &item in &prefill {
            queue.put(item).unwrap();
        }
        queue.close();

        for &expected in &prefill {
            prop_assert_eq!(queue.take().unwrap(), expected);
        }
        prop_assert!(queue.take().is_err(), "drained closed queue must fail");
        prop_assert!(queue.put(0).is_err(), "closed queue must refuse puts");
    }
}
