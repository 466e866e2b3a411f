//! Compute Slot Module
//!
//! A one-shot completion slot: the caller that installed the slot runs the
//! computation, every other caller for the same key waits on it and reads
//! the shared outcome.

use parking_lot::{Condvar, Mutex};

use crate::error::{CacheError, Result};

// == Slot State ==
/// Lifecycle of a per-key computation.
#[derive(Debug)]
enum SlotState<V> {
    /// The owning caller is still running the compute function
    Computing,
    /// Computation finished; every caller receives a clone of this value
    Ready(V),
    /// Computation failed; waiters receive the message
    Failed(String),
}

// == Compute Slot ==
/// Shared completion handle for a single key's computation.
#[derive(Debug)]
pub(crate) struct ComputeSlot<V> {
    /// Current state, transitions Computing -> Ready | Failed exactly once
    state: Mutex<SlotState<V>>,
    /// Signalled once the state leaves Computing
    done: Condvar,
}

impl<V> ComputeSlot<V> {
    // == Constructor ==
    /// Creates a slot in the Computing state.
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Computing),
            done: Condvar::new(),
        }
    }

    // == Complete ==
    /// Publishes the computed value and wakes every waiter.
    pub(crate) fn complete(&self, value: V) {
        let mut state = self.state.lock();
        *state = SlotState::Ready(value);
        drop(state);
        self.done.notify_all();
    }

    // == Fail ==
    /// Marks the computation as failed and wakes every waiter.
    pub(crate) fn fail(&self, message: String) {
        let mut state = self.state.lock();
        *state = SlotState::Failed(message);
        drop(state);
        self.done.notify_all();
    }
}

impl<V: Clone> ComputeSlot<V> {
    // == Wait ==
    /// Blocks until the computation completes and returns its outcome.
    ///
    /// The wait is a loop around the state check, so spurious wakeups
    /// simply re-evaluate the guard.
    pub(crate) fn wait(&self) -> Result<V> {
        let mut state = self.state.lock();
        loop {
            match &*state {
                SlotState::Computing => self.done.wait(&mut state),
                SlotState::Ready(value) => return Ok(value.clone()),
                SlotState::Failed(message) => {
                    return Err(CacheError::ComputeFailed(message.clone()))
                }
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_completed_value() {
        let slot = ComputeSlot::new();
        slot.complete(99);
        assert_eq!(slot.wait().unwrap(), 99);
    }

    #[test]
    fn test_wait_blocks_until_complete() {
        let slot = Arc::new(ComputeSlot::new());

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.wait())
        };

        thread::sleep(Duration::from_millis(50));
        slot.complete("done".to_string());

        assert_eq!(waiter.join().unwrap().unwrap(), "done");
    }

    #[test]
    fn test_fail_propagates_to_all_waiters() {
        let slot: Arc<ComputeSlot<i32>> = Arc::new(ComputeSlot::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let slot = Arc::clone(&slot);
                thread::spawn(move || slot.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        slot.fail("boom".to_string());

        for waiter in waiters {
            let err = waiter.join().unwrap().unwrap_err();
            assert_eq!(err, CacheError::ComputeFailed("boom".to_string()));
        }
    }
}
