//! Bounded Blocking Queue Module
//!
//! Fixed-capacity FIFO queue with blocking put/take used to hand items
//! from producer threads to consumer threads.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::error::{PutError, TakeError};

// == Queue State ==
/// Buffer and teardown flag, guarded by a single mutex.
#[derive(Debug)]
struct QueueState<T> {
    /// FIFO buffer holding at most `capacity` items
    buffer: VecDeque<T>,
    /// Set by `close()`; releases every blocked caller
    closed: bool,
}

// == Bounded Blocking Queue ==
/// Fixed-capacity FIFO queue shared between producer and consumer threads.
///
/// `put` blocks while the queue is full and `take` blocks while it is
/// empty. Blocked threads suspend on condition variables and re-check
/// their guard after every wake; there is no polling. Every item put is
/// taken exactly once, in insertion order.
#[derive(Debug)]
pub struct BoundedBlockingQueue<T> {
    /// Buffer and flags, mutated only inside the critical section
    state: Mutex<QueueState<T>>,
    /// Signalled when a slot frees up (a take completed or the queue closed)
    not_full: Condvar,
    /// Signalled when an item arrives (a put completed or the queue closed)
    not_empty: Condvar,
    /// Fixed capacity, set at construction
    capacity: usize,
}

impl<T> BoundedBlockingQueue<T> {
    // == Constructor ==
    /// Creates a new queue with the given fixed capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "queue capacity must be at least 1");

        Self {
            state: Mutex::new(QueueState {
                buffer: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    // == Put ==
    /// Inserts an item at the tail, blocking while the queue is full.
    ///
    /// Wakes at most one waiting `take` caller on success. If the queue
    /// is closed before the item could be inserted, the item is handed
    /// back inside the error and the queue is left unchanged.
    pub fn put(&self, item: T) -> Result<(), PutError<T>> {
        let mut state = self.state.lock();

        // Wait-loop around the guard condition; re-checked after every
        // wake so spurious wakeups and stolen slots are handled.
        while !state.closed && state.buffer.len() == self.capacity {
            self.not_full.wait(&mut state);
        }

        if state.closed {
            return Err(PutError(item));
        }

        state.buffer.push_back(item);

        // The buffer must never grow past the fixed bound; a violation
        // is a synchronization bug, not a runtime condition.
        assert!(
            state.buffer.len() <= self.capacity,
            "queue exceeded its capacity"
        );

        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    // == Take ==
    /// Removes and returns the head item, blocking while the queue is empty.
    ///
    /// Wakes at most one waiting `put` caller on success. After `close()`,
    /// remaining buffered items are still drained in order; only a closed
    /// and empty queue fails.
    pub fn take(&self) -> Result<T, TakeError> {
        let mut state = self.state.lock();

        while !state.closed && state.buffer.is_empty() {
            self.not_empty.wait(&mut state);
        }

        match state.buffer.pop_front() {
            Some(item) => {
                drop(state);
                self.not_full.notify_one();
                Ok(item)
            }
            // Reachable only when closed: the wait loop above holds
            // until an item arrives otherwise.
            None => Err(TakeError),
        }
    }

    // == Close ==
    /// Closes the queue, releasing every blocked `put` and `take` caller.
    ///
    /// Subsequent `put` calls fail immediately; `take` keeps returning
    /// buffered items until the queue is drained.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);

        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    // == Is Closed ==
    /// Returns true if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    // == Length ==
    /// Returns the current number of buffered items.
    ///
    /// Advisory only: the value may be stale as soon as it is returned
    /// when other threads are putting or taking concurrently.
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    // == Is Empty ==
    /// Returns true if the queue holds no items (advisory, see `len`).
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    // == Capacity ==
    /// Returns the fixed capacity set at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
