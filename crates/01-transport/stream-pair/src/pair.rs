use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{TransportError, TransportResult};

/// Capacity used by [`StreamPair::new`].
pub const DEFAULT_CAPACITY: usize = 1024 * 1024;

/// Smallest capacity accepted by [`StreamPair::with_capacity`].
pub const MIN_CAPACITY: usize = 1;

struct SharedPipe {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
    sink_closed: AtomicBool,
    source_closed: AtomicBool,
    metrics: PipeMetrics,
}

impl SharedPipe {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            buf: Mutex::new(VecDeque::new()),
            capacity,
            sink_closed: AtomicBool::new(false),
            source_closed: AtomicBool::new(false),
            metrics: PipeMetrics::default(),
        })
    }

    fn sink(self: &Arc<Self>) -> SinkStream {
        SinkStream {
            inner: Arc::clone(self),
        }
    }

    fn source(self: &Arc<Self>) -> SourceStream {
        SourceStream {
            inner: Arc::clone(self),
        }
    }

    fn push(&self, data: &[u8]) -> TransportResult<usize> {
        // A closed source means nobody can ever observe the bytes.
        if self.sink_closed.load(Ordering::Acquire) || self.source_closed.load(Ordering::Acquire)
        {
            return Err(TransportError::Closed);
        }
        if data.is_empty() {
            return Ok(0);
        }

        let mut buf = self.buf.lock();
        let room = self.capacity.saturating_sub(buf.len());
        if room == 0 {
            return Err(TransportError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let n = room.min(data.len());
        buf.extend(&data[..n]);
        self.metrics.bytes_written.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }

    fn pull(&self, out: &mut [u8]) -> TransportResult<usize> {
        if self.source_closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let mut buf = self.buf.lock();
        let n = buf.len().min(out.len());
        for (dst, byte) in out.iter_mut().zip(buf.drain(..n)) {
            *dst = byte;
        }
        self.metrics.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

#[derive(Default)]
struct PipeMetrics {
    bytes_written: AtomicU64,
    bytes_read: AtomicU64,
    resets: AtomicU64,
}

impl PipeMetrics {
    fn snapshot(&self) -> PairMetricsSnapshot {
        PairMetricsSnapshot {
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

/// Byte counters accumulated over the lifetime of a pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PairMetricsSnapshot {
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub resets: u64,
}

/// Writable endpoint of a [`StreamPair`].
pub struct SinkStream {
    inner: Arc<SharedPipe>,
}

impl SinkStream {
    pub fn is_closed(&self) -> bool {
        self.inner.sink_closed.load(Ordering::Acquire)
    }

    /// Closes the sink. Bytes already written stay readable from the source.
    pub fn close(&self) -> TransportResult<()> {
        if self.inner.sink_closed.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyClosed);
        }
        Ok(())
    }
}

impl Write for SinkStream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.inner.push(data).map_err(TransportError::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Readable endpoint of a [`StreamPair`].
///
/// Reads never block: an empty pipe reports end of stream.
pub struct SourceStream {
    inner: Arc<SharedPipe>,
}

impl SourceStream {
    pub fn is_closed(&self) -> bool {
        self.inner.source_closed.load(Ordering::Acquire)
    }

    /// Closes the source and discards anything still buffered.
    pub fn close(&self) -> TransportResult<()> {
        if self.inner.source_closed.swap(true, Ordering::AcqRel) {
            return Err(TransportError::AlreadyClosed);
        }
        self.inner.buf.lock().clear();
        Ok(())
    }

    /// Number of bytes written to the sink and not yet read.
    pub fn pending(&self) -> usize {
        self.inner.buf.lock().len()
    }
}

impl Read for SourceStream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        self.inner.pull(out).map_err(TransportError::into_io)
    }
}

/// Linked sink/source endpoints over one in-memory FIFO.
///
/// Whatever is written to [`StreamPair::sink`] can be read back, in order,
/// from [`StreamPair::source`]. The pair is the medium for a single
/// serialize-then-deserialize round trip and is reset between uses.
pub struct StreamPair {
    sink: SinkStream,
    source: SourceStream,
}

impl StreamPair {
    /// Creates a pair with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        let shared = SharedPipe::new(DEFAULT_CAPACITY);
        Self {
            sink: shared.sink(),
            source: shared.source(),
        }
    }

    /// Creates a pair that buffers at most `capacity` unread bytes.
    pub fn with_capacity(capacity: usize) -> TransportResult<Self> {
        if capacity < MIN_CAPACITY {
            return Err(TransportError::InvalidCapacity {
                requested: capacity,
                minimum: MIN_CAPACITY,
            });
        }
        let shared = SharedPipe::new(capacity);
        Ok(Self {
            sink: shared.sink(),
            source: shared.source(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.sink.inner.capacity
    }

    pub fn sink(&mut self) -> &mut SinkStream {
        &mut self.sink
    }

    pub fn source(&mut self) -> &mut SourceStream {
        &mut self.source
    }

    /// Borrows both endpoints at once.
    pub fn split_mut(&mut self) -> (&mut SinkStream, &mut SourceStream) {
        (&mut self.sink, &mut self.source)
    }

    /// True when either endpoint has been closed.
    pub fn is_closed(&self) -> bool {
        self.sink.is_closed() || self.source.is_closed()
    }

    pub fn pending(&self) -> usize {
        self.source.pending()
    }

    /// Discards unread bytes so the next round trip starts empty.
    ///
    /// Returns the number of bytes dropped.
    pub fn reset(&mut self) -> TransportResult<usize> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut buf = self.source.inner.buf.lock();
        let dropped = buf.len();
        buf.clear();
        self.source
            .inner
            .metrics
            .resets
            .fetch_add(1, Ordering::Relaxed);
        Ok(dropped)
    }

    /// Closes both endpoints.
    ///
    /// Fails with [`TransportError::AlreadyClosed`] only when both endpoints
    /// were closed before the call.
    pub fn close(&self) -> TransportResult<()> {
        let sink = self.sink.close();
        let source = self.source.close();
        match (sink, source) {
            (Err(_), Err(_)) => Err(TransportError::AlreadyClosed),
            _ => Ok(()),
        }
    }

    pub fn metrics(&self) -> PairMetricsSnapshot {
        self.sink.inner.metrics.snapshot()
    }
}

impl Default for StreamPair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_come_back_in_order() {
        let mut pair = StreamPair::with_capacity(64).unwrap();
        pair.sink().write_all(b"abc").unwrap();
        pair.sink().write_all(b"def").unwrap();

        let mut out = Vec::new();
        pair.source().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abcdef");
        assert_eq!(pair.pending(), 0);
    }

    #[test]
    fn empty_source_reads_as_eof() {
        let mut pair = StreamPair::new();
        let mut out = [0u8; 8];
        assert_eq!(pair.source().read(&mut out).unwrap(), 0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = StreamPair::with_capacity(0).err().unwrap();
        assert_eq!(
            err,
            TransportError::InvalidCapacity {
                requested: 0,
                minimum: MIN_CAPACITY
            }
        );
    }

    #[test]
    fn write_past_capacity_fails() {
        let mut pair = StreamPair::with_capacity(4).unwrap();
        let err = pair.sink().write_all(b"too long").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        // The prefix that fit is still buffered.
        assert_eq!(pair.pending(), 4);
    }

    #[test]
    fn reset_discards_residue() {
        let mut pair = StreamPair::with_capacity(16).unwrap();
        pair.sink().write_all(b"left over").unwrap();
        assert_eq!(pair.reset().unwrap(), 9);
        assert_eq!(pair.pending(), 0);
        assert_eq!(pair.metrics().resets, 1);
    }

    #[test]
    fn closed_pair_rejects_io() {
        let mut pair = StreamPair::new();
        pair.close().unwrap();
        assert!(pair.is_closed());

        let err = pair.sink().write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        let mut out = [0u8; 1];
        let err = pair.source().read(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(pair.reset(), Err(TransportError::Closed));
    }

    #[test]
    fn double_close_reports_already_closed() {
        let pair = StreamPair::new();
        pair.close().unwrap();
        assert_eq!(pair.close(), Err(TransportError::AlreadyClosed));
    }

    #[test]
    fn closing_one_endpoint_marks_pair_closed() {
        let mut pair = StreamPair::new();
        pair.sink().close().unwrap();
        assert!(pair.is_closed());
        // Closing the remaining endpoint through the pair still succeeds.
        pair.close().unwrap();
    }

    #[test]
    fn metrics_track_traffic() {
        let mut pair = StreamPair::new();
        let (sink, source) = pair.split_mut();
        sink.write_all(&[1, 2, 3, 4]).unwrap();
        let mut out = [0u8; 3];
        source.read_exact(&mut out).unwrap();

        let metrics = pair.metrics();
        assert_eq!(metrics.bytes_written, 4);
        assert_eq!(metrics.bytes_read, 3);
    }
}
