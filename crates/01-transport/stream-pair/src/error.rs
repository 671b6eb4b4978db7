//! Error handling helpers for the stream-pair crate.
//!
//! The surface stays small: capacity validation at construction, capacity
//! exhaustion while writing and close bookkeeping. I/O adapters wrap these in
//! `std::io::Error` so codecs see ordinary stream failures.

use std::io;

use thiserror::Error;

/// Convenience result alias for fallible stream-pair operations.
pub type TransportResult<T, E = TransportError> = Result<T, E>;

/// Errors surfaced by stream-pair construction and lifecycle helpers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Requested capacity is below the minimum accepted by a pair.
    #[error("stream pair capacity {requested} must be at least {minimum} bytes")]
    InvalidCapacity { requested: usize, minimum: usize },

    /// A write would push the buffered byte count past the pair capacity.
    #[error("stream pair capacity of {capacity} bytes exhausted")]
    CapacityExceeded { capacity: usize },

    /// The endpoint (or both endpoints) was closed already.
    #[error("stream pair endpoint already closed")]
    AlreadyClosed,

    /// The operation requires an open pair.
    #[error("stream pair is closed")]
    Closed,
}

impl TransportError {
    pub(crate) fn into_io(self) -> io::Error {
        let kind = match self {
            TransportError::Closed | TransportError::AlreadyClosed => io::ErrorKind::BrokenPipe,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, self)
    }
}
