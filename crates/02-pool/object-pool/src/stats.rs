use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct PoolMetrics {
    created: AtomicU64,
    destroyed: AtomicU64,
    borrow_timeouts: AtomicU64,
    validation_failures: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.borrow_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_validation_failure(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, idle: usize, borrowed: usize, total: usize) -> PoolStats {
        PoolStats {
            idle,
            borrowed,
            total,
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
            borrow_timeouts: self.borrow_timeouts.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a [`ResourcePool`](crate::ResourcePool).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Objects waiting in the idle list.
    pub idle: usize,
    /// Objects currently lent out.
    pub borrowed: usize,
    /// Objects in existence, including those being created.
    pub total: usize,
    pub created: u64,
    pub destroyed: u64,
    pub borrow_timeouts: u64,
    pub validation_failures: u64,
}
