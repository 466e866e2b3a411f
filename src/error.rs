//! Error types for the synchronization primitives
//!
//! Provides unified error handling using thiserror.

use std::fmt;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the memoizing caches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The compute function failed (or panicked) while producing a value
    #[error("compute failed: {0}")]
    ComputeFailed(String),

    /// The cache has been shut down and accepts no further lookups
    #[error("cache is shut down")]
    ShutDown,
}

// == Queue Errors ==
/// Error returned by `put` when the queue is closed.
///
/// Carries the rejected item back to the caller so nothing is lost;
/// the queue itself is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PutError<T>(pub T);

impl<T> fmt::Display for PutError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "put interrupted: queue closed while waiting")
    }
}

impl<T: fmt::Debug> std::error::Error for PutError<T> {}

/// Error returned by `take` when the queue is closed and fully drained.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("take interrupted: queue closed and empty")]
pub struct TakeError;

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
