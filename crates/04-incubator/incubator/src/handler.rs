//! Pluggable sinks for incubation failures.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{ErrorKind, IncubatorError};

/// Receives every failure an incubator swallows.
///
/// Handlers run on the thread that hit the failure, after the pooled
/// resources of that attempt have been returned.
pub trait ExceptionHandler: Send + Sync + 'static {
    fn deal_exception(&self, error: &IncubatorError);
}

impl<F> ExceptionHandler for F
where
    F: Fn(&IncubatorError) + Send + Sync + 'static,
{
    fn deal_exception(&self, error: &IncubatorError) {
        self(error)
    }
}

/// Default handler: logs the failure and carries on.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingExceptionHandler;

impl ExceptionHandler for LoggingExceptionHandler {
    fn deal_exception(&self, error: &IncubatorError) {
        tracing::error!(kind = ?error.kind(), "incubation failed: {error}");
    }
}

/// Tallies failures by kind. Clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct CountingExceptionHandler {
    counts: Arc<[AtomicU64; ErrorKind::COUNT]>,
}

impl CountingExceptionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.counts[kind.index()].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
}

impl ExceptionHandler for CountingExceptionHandler {
    fn deal_exception(&self, error: &IncubatorError) {
        self.counts[error.kind().index()].fetch_add(1, Ordering::Relaxed);
    }
}

/// Handler slot shared between the incubator and its stream factory.
#[derive(Clone)]
pub(crate) struct SharedHandler {
    slot: Arc<ArcSwap<Box<dyn ExceptionHandler>>>,
}

impl SharedHandler {
    pub(crate) fn new(handler: Box<dyn ExceptionHandler>) -> Self {
        Self {
            slot: Arc::new(ArcSwap::from_pointee(handler)),
        }
    }

    /// Later reports go to `handler`; reports already running finish on the old one.
    pub(crate) fn replace(&self, handler: Box<dyn ExceptionHandler>) {
        self.slot.store(Arc::new(handler));
    }

    pub(crate) fn report(&self, error: &IncubatorError) {
        self.slot.load().deal_exception(error);
    }
}

impl Default for SharedHandler {
    fn default() -> Self {
        Self::new(Box::new(LoggingExceptionHandler))
    }
}
