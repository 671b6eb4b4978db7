//! Non-blocking pool of recreatable instances.
//!
//! Idle instances are held softly: they can be dropped at any time through
//! [`SoftPool::reclaim_idle`] and are transparently recreated on the next
//! borrow. Borrowing never blocks and never fails while the pool is open.

use std::convert::Infallible;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{PoolError, PoolResult};

type Create<T> = Box<dyn Fn() -> T + Send + Sync>;

struct SoftState<T> {
    idle: Vec<T>,
    borrowed: usize,
    closed: bool,
}

struct SoftInner<T> {
    create: Create<T>,
    soft_limit: usize,
    state: Mutex<SoftState<T>>,
    created: AtomicU64,
    reclaimed: AtomicU64,
}

impl<T> SoftInner<T> {
    fn give_back(&self, object: T) {
        let mut state = self.state.lock();
        state.borrowed = state.borrowed.saturating_sub(1);
        if !state.closed && state.idle.len() < self.soft_limit {
            state.idle.push(object);
            return;
        }
        drop(state);
        drop(object);
    }
}

/// Counters describing a [`SoftPool`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoftPoolStats {
    pub idle: usize,
    pub borrowed: usize,
    pub created: u64,
    pub reclaimed: u64,
}

pub struct SoftPool<T: Send + 'static> {
    inner: Arc<SoftInner<T>>,
}

impl<T: Send + 'static> SoftPool<T> {
    /// `soft_limit` caps the idle list; instances returned beyond it are dropped.
    pub fn new<C>(soft_limit: usize, create: C) -> Self
    where
        C: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(SoftInner {
                create: Box::new(create),
                soft_limit,
                state: Mutex::new(SoftState {
                    idle: Vec::new(),
                    borrowed: 0,
                    closed: false,
                }),
                created: AtomicU64::new(0),
                reclaimed: AtomicU64::new(0),
            }),
        }
    }

    /// Pops an idle instance or creates a new one.
    pub fn borrow_one(&self) -> PoolResult<SoftLease<T>, Infallible> {
        let reused = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(PoolError::Closed);
            }
            let reused = state.idle.pop();
            if reused.is_some() {
                state.borrowed += 1;
            }
            reused
        };

        let object = match reused {
            Some(object) => object,
            None => {
                // Counted as borrowed only once the instance exists.
                let object = (self.inner.create)();
                self.inner.created.fetch_add(1, Ordering::Relaxed);
                self.inner.state.lock().borrowed += 1;
                object
            }
        };

        Ok(SoftLease {
            pool: Arc::clone(&self.inner),
            object: Some(object),
        })
    }

    /// Drops every idle instance. Returns how many were released.
    pub fn reclaim_idle(&self) -> usize {
        let released = std::mem::take(&mut self.inner.state.lock().idle);
        let count = released.len();
        self.inner
            .reclaimed
            .fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Discards all idle instances and refuses further borrows.
    ///
    /// Returns true for the call that performed the close.
    pub fn close(&self) -> bool {
        let released = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        drop(released);
        true
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn soft_limit(&self) -> usize {
        self.inner.soft_limit
    }

    pub fn stats(&self) -> SoftPoolStats {
        let state = self.inner.state.lock();
        SoftPoolStats {
            idle: state.idle.len(),
            borrowed: state.borrowed,
            created: self.inner.created.load(Ordering::Relaxed),
            reclaimed: self.inner.reclaimed.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive use of a soft-pooled instance. Dropping it returns the instance.
pub struct SoftLease<T: Send + 'static> {
    pool: Arc<SoftInner<T>>,
    object: Option<T>,
}

impl<T: Send + 'static> Deref for SoftLease<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.object.as_ref().expect("lease holds its object until dropped")
    }
}

impl<T: Send + 'static> DerefMut for SoftLease<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.object.as_mut().expect("lease holds its object until dropped")
    }
}

impl<T: Send + 'static> Drop for SoftLease<T> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.pool.give_back(object);
        }
    }
}
