//! Error types for pool operations

use std::time::Duration;
use thiserror::Error;

/// Unified error type for allocation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Requested size is zero or exceeds the pool's total capacity.
    ///
    /// Detected before any lock is taken; the call never blocks.
    #[error("invalid allocation size {requested} (pool capacity is {capacity})")]
    InvalidSize { requested: usize, capacity: usize },

    /// No capacity became available before the deadline.
    ///
    /// The waiter registration is removed before this propagates, so a
    /// timed-out caller leaves no trace in the pool.
    #[error("timed out after {waited:?} waiting for pool capacity")]
    Timeout { waited: Duration },

    /// The pool was closed while the caller was blocked (or before it
    /// called in). Same cleanup guarantee as [`Error::Timeout`].
    #[error("pool closed while waiting for capacity")]
    Cancelled,
}

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, Error>;
