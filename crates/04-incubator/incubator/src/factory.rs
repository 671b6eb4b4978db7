use object_pool::PooledObjectFactory;
use stream_pair::{StreamPair, TransportError};

use crate::error::IncubatorError;
use crate::handler::SharedHandler;

/// Pool factory for the in-memory channels copies travel through.
///
/// Creation and release failures are reported to the incubator's handler
/// here, at the point they happen.
pub struct StreamPairFactory {
    capacity: usize,
    handler: SharedHandler,
}

impl StreamPairFactory {
    pub(crate) fn new(capacity: usize, handler: SharedHandler) -> Self {
        Self { capacity, handler }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl PooledObjectFactory for StreamPairFactory {
    type Object = StreamPair;
    type Error = TransportError;

    fn create(&self) -> Result<StreamPair, TransportError> {
        StreamPair::with_capacity(self.capacity).inspect_err(|err| {
            self.handler
                .report(&IncubatorError::ResourceCreation(err.clone()));
        })
    }

    fn validate(&self, pair: &StreamPair) -> bool {
        !pair.is_closed()
    }

    fn passivate(&self, pair: &mut StreamPair) -> Result<(), TransportError> {
        let dropped = pair.reset()?;
        if dropped > 0 {
            tracing::debug!(dropped, "discarded residual bytes from stream pair");
        }
        Ok(())
    }

    fn destroy(&self, pair: StreamPair) {
        let traffic = pair.metrics();
        tracing::debug!(
            bytes_written = traffic.bytes_written,
            round_trips = traffic.resets,
            "retiring stream pair"
        );
        if let Err(err) = pair.close() {
            tracing::warn!("failed to close stream pair: {err}");
            self.handler.report(&IncubatorError::ResourceRelease(err));
        }
    }
}
