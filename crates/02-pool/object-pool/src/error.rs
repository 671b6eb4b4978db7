use std::time::Duration;

use thiserror::Error;

/// Convenience result alias for pool operations.
pub type PoolResult<T, E> = Result<T, PoolError<E>>;

/// Failures returned when borrowing from a pool.
///
/// `E` is the error type of the factory that manufactures pooled objects.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// No object became available within the configured wait.
    #[error("pool exhausted: no object available after {waited:?}")]
    Exhausted { waited: Duration },

    /// The pool has been closed.
    #[error("pool is closed")]
    Closed,

    /// The factory failed to manufacture a new object.
    #[error("failed to create pooled object: {0}")]
    Create(#[source] E),
}

impl<E> PoolError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::Exhausted { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }
}

/// Rejected pool configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid pool configuration: {0}")]
pub struct InvalidConfig(pub &'static str);
