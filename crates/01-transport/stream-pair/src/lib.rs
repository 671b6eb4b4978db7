//! In-memory stream pairs used as the medium of a serialization round trip.
//!
//! * [`StreamPair`] – owns a linked [`SinkStream`] / [`SourceStream`] over one FIFO.
//! * [`SinkStream`] implements [`std::io::Write`], [`SourceStream`] implements [`std::io::Read`].
//! * [`TransportError`] – capacity and lifecycle failures.

mod error;
mod pair;

pub use error::{TransportError, TransportResult};
pub use pair::{
    PairMetricsSnapshot, SinkStream, SourceStream, StreamPair, DEFAULT_CAPACITY, MIN_CAPACITY,
};
