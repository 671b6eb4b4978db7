//! Bounded, blocking object pool with validation and idle eviction.
//!
//! Borrowers receive a [`Lease`] that gives the object back when dropped, so
//! every borrow is matched by exactly one return on every exit path. When the
//! pool is at `max_total`, `borrow` parks on a condition variable until an
//! object comes back or `max_wait` elapses.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::config::PoolConfig;
use crate::error::{InvalidConfig, PoolError, PoolResult};
use crate::evictor::Evictor;
use crate::factory::PooledObjectFactory;
use crate::stats::{PoolMetrics, PoolStats};

struct IdleEntry<T> {
    object: T,
    since: Instant,
}

struct PoolState<T> {
    idle: VecDeque<IdleEntry<T>>,
    /// Idle + borrowed + in creation.
    total: usize,
    borrowed: usize,
    closed: bool,
}

impl<T> PoolState<T> {
    fn take_idle(&mut self, lifo: bool) -> Option<IdleEntry<T>> {
        if lifo {
            self.idle.pop_back()
        } else {
            self.idle.pop_front()
        }
    }

    fn release_slot(&mut self) {
        self.borrowed = self.borrowed.saturating_sub(1);
        self.total = self.total.saturating_sub(1);
    }
}

pub(crate) struct PoolInner<F: PooledObjectFactory> {
    factory: F,
    config: PoolConfig,
    state: Mutex<PoolState<F::Object>>,
    available: Condvar,
    metrics: PoolMetrics,
}

impl<F: PooledObjectFactory> PoolInner<F> {
    fn borrow(&self) -> PoolResult<F::Object, F::Error> {
        let started = Instant::now();
        let deadline = started + self.config.max_wait();
        let mut state = self.state.lock();

        loop {
            if state.closed {
                return Err(PoolError::Closed);
            }

            if let Some(entry) = state.take_idle(self.config.lifo) {
                state.borrowed += 1;
                if !self.config.test_on_borrow {
                    return Ok(entry.object);
                }
                let valid =
                    MutexGuard::unlocked(&mut state, || self.factory.validate(&entry.object));
                if valid {
                    return Ok(entry.object);
                }
                state.release_slot();
                self.metrics.record_validation_failure();
                MutexGuard::unlocked(&mut state, || self.destroy(entry.object));
                self.available.notify_one();
                continue;
            }

            if state.total < self.config.max_total {
                state.total += 1;
                state.borrowed += 1;
                let created = MutexGuard::unlocked(&mut state, || self.factory.create());
                return match created {
                    Ok(object) if state.closed => {
                        state.release_slot();
                        drop(state);
                        self.metrics.record_created();
                        self.destroy(object);
                        Err(PoolError::Closed)
                    }
                    Ok(object) => {
                        self.metrics.record_created();
                        Ok(object)
                    }
                    Err(err) => {
                        state.release_slot();
                        self.available.notify_one();
                        Err(PoolError::Create(err))
                    }
                };
            }

            if self.available.wait_until(&mut state, deadline).timed_out() {
                let obtainable = !state.idle.is_empty() || state.total < self.config.max_total;
                if state.closed || obtainable {
                    continue;
                }
                self.metrics.record_timeout();
                return Err(PoolError::Exhausted {
                    waited: started.elapsed(),
                });
            }
        }
    }

    fn give_back(&self, mut object: F::Object) {
        let mut keep = true;
        if self.config.test_on_return && !self.factory.validate(&object) {
            self.metrics.record_validation_failure();
            keep = false;
        }
        if keep {
            if let Err(err) = self.factory.passivate(&mut object) {
                tracing::debug!("destroying pooled object that failed to passivate: {err}");
                keep = false;
            }
        }

        let mut state = self.state.lock();
        if keep && !state.closed && state.idle.len() < self.config.max_idle {
            state.borrowed = state.borrowed.saturating_sub(1);
            state.idle.push_back(IdleEntry {
                object,
                since: Instant::now(),
            });
            drop(state);
            self.available.notify_one();
            return;
        }

        state.release_slot();
        drop(state);
        self.available.notify_one();
        self.destroy(object);
    }

    fn invalidate(&self, object: F::Object) {
        self.state.lock().release_slot();
        self.available.notify_one();
        self.destroy(object);
    }

    fn destroy(&self, object: F::Object) {
        self.factory.destroy(object);
        self.metrics.record_destroyed();
    }

    /// Creates idle objects until `target` are idle, bounded by the pool caps.
    fn fill_idle(&self, target: usize) -> Result<usize, F::Error> {
        let target = target.min(self.config.max_idle);
        let mut created = 0;
        loop {
            {
                let mut state = self.state.lock();
                if state.closed
                    || state.idle.len() >= target
                    || state.total >= self.config.max_total
                {
                    return Ok(created);
                }
                state.total += 1;
            }

            match self.factory.create() {
                Ok(object) => {
                    self.metrics.record_created();
                    let mut state = self.state.lock();
                    if state.closed {
                        state.total = state.total.saturating_sub(1);
                        drop(state);
                        self.destroy(object);
                        return Ok(created);
                    }
                    state.idle.push_back(IdleEntry {
                        object,
                        since: Instant::now(),
                    });
                    drop(state);
                    self.available.notify_one();
                    created += 1;
                }
                Err(err) => {
                    let mut state = self.state.lock();
                    state.total = state.total.saturating_sub(1);
                    drop(state);
                    self.available.notify_one();
                    return Err(err);
                }
            }
        }
    }

    /// One maintenance sweep. Returns the number of objects destroyed.
    pub(crate) fn evict(&self) -> usize {
        let min_idle_time = self.config.min_evictable_idle_time();
        let now = Instant::now();
        let mut victims = Vec::new();

        {
            let mut state = self.state.lock();
            if state.closed {
                return 0;
            }
            // Entries are pushed at the back, so the front holds the oldest.
            while state.idle.len() > self.config.min_idle {
                let expired = state
                    .idle
                    .front()
                    .is_some_and(|entry| now.duration_since(entry.since) >= min_idle_time);
                if !expired {
                    break;
                }
                if let Some(entry) = state.idle.pop_front() {
                    state.total = state.total.saturating_sub(1);
                    victims.push(entry.object);
                }
            }
        }

        if self.config.test_while_idle {
            self.test_idle(&mut victims);
        }

        let destroyed = victims.len();
        if destroyed > 0 {
            self.available.notify_all();
        }
        for object in victims {
            self.destroy(object);
        }

        if let Err(err) = self.fill_idle(self.config.min_idle) {
            tracing::warn!("failed to top up idle objects: {err}");
        }
        destroyed
    }

    /// Validates every idle object outside the lock. Probed objects stay counted in
    /// `total` while they are tested, so the caps hold throughout.
    fn test_idle(&self, victims: &mut Vec<F::Object>) {
        let probing: Vec<IdleEntry<F::Object>> = self.state.lock().idle.drain(..).collect();
        let mut survivors = Vec::with_capacity(probing.len());
        let mut dropped = 0;
        for entry in probing {
            if self.factory.validate(&entry.object) {
                survivors.push(entry);
            } else {
                self.metrics.record_validation_failure();
                victims.push(entry.object);
                dropped += 1;
            }
        }

        let mut state = self.state.lock();
        for entry in survivors.into_iter().rev() {
            if state.closed || state.idle.len() >= self.config.max_idle {
                victims.push(entry.object);
                dropped += 1;
            } else {
                state.idle.push_front(entry);
            }
        }
        state.total = state.total.saturating_sub(dropped);
    }

    fn close(&self) -> bool {
        let drained: Vec<IdleEntry<F::Object>> = {
            let mut state = self.state.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            let drained: Vec<_> = state.idle.drain(..).collect();
            state.total = state.total.saturating_sub(drained.len());
            drained
        };
        self.available.notify_all();
        for entry in drained {
            self.destroy(entry.object);
        }
        true
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        self.metrics
            .snapshot(state.idle.len(), state.borrowed, state.total)
    }
}

/// Generic bounded pool of objects manufactured by a [`PooledObjectFactory`].
pub struct ResourcePool<F: PooledObjectFactory> {
    inner: Arc<PoolInner<F>>,
    evictor: Mutex<Option<Evictor>>,
}

impl<F: PooledObjectFactory> ResourcePool<F> {
    /// Builds a pool and, when configured, starts its evictor thread.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, InvalidConfig> {
        config.validate()?;
        let interval = config.time_between_eviction_runs();
        let inner = Arc::new(PoolInner {
            factory,
            config,
            state: Mutex::new(PoolState {
                idle: VecDeque::new(),
                total: 0,
                borrowed: 0,
                closed: false,
            }),
            available: Condvar::new(),
            metrics: PoolMetrics::default(),
        });

        let evictor = interval.and_then(|every| {
            match Evictor::spawn(Arc::downgrade(&inner), every) {
                Ok(evictor) => Some(evictor),
                Err(err) => {
                    tracing::warn!("idle eviction disabled, evictor thread failed to start: {err}");
                    None
                }
            }
        });

        Ok(Self {
            inner,
            evictor: Mutex::new(evictor),
        })
    }

    /// Borrows an object, waiting up to `max_wait` when the pool is at capacity.
    pub fn borrow(&self) -> PoolResult<Lease<F>, F::Error> {
        let object = self.inner.borrow()?;
        Ok(Lease {
            pool: Arc::clone(&self.inner),
            object: Some(object),
        })
    }

    /// Warms the pool with up to `count` idle objects.
    pub fn prepare(&self, count: usize) -> Result<usize, F::Error> {
        self.inner.fill_idle(count)
    }

    /// Runs one eviction sweep on the calling thread.
    pub fn evict(&self) -> usize {
        self.inner.evict()
    }

    /// Closes the pool. Returns true for the call that performed the close.
    ///
    /// Idle objects are destroyed immediately, waiters fail with
    /// [`PoolError::Closed`] and outstanding leases are destroyed on return.
    pub fn close(&self) -> bool {
        if let Some(evictor) = self.evictor.lock().take() {
            evictor.stop();
        }
        self.inner.close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn factory(&self) -> &F {
        &self.inner.factory
    }
}

impl<F: PooledObjectFactory> Drop for ResourcePool<F> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Exclusive use of a pooled object. Dropping the lease returns it.
pub struct Lease<F: PooledObjectFactory> {
    pool: Arc<PoolInner<F>>,
    object: Option<F::Object>,
}

impl<F: PooledObjectFactory> Lease<F> {
    /// Destroys the object instead of returning it to the idle list.
    pub fn invalidate(mut self) {
        if let Some(object) = self.object.take() {
            self.pool.invalidate(object);
        }
    }
}

impl<F: PooledObjectFactory> Deref for Lease<F> {
    type Target = F::Object;

    fn deref(&self) -> &Self::Target {
        self.object.as_ref().expect("lease holds its object until dropped")
    }
}

impl<F: PooledObjectFactory> DerefMut for Lease<F> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object.as_mut().expect("lease holds its object until dropped")
    }
}

impl<F: PooledObjectFactory> Drop for Lease<F> {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.pool.give_back(object);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::thread;
    use std::time::Duration;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("factory refused")]
    struct Refused;

    #[derive(Default)]
    struct Numbered {
        next: AtomicU32,
        destroyed: Mutex<Vec<u32>>,
        refuse_create: AtomicBool,
        refuse_passivate: AtomicBool,
        reject_below: AtomicU32,
    }

    impl PooledObjectFactory for Numbered {
        type Object = u32;
        type Error = Refused;

        fn create(&self) -> Result<u32, Refused> {
            if self.refuse_create.load(Ordering::SeqCst) {
                return Err(Refused);
            }
            Ok(self.next.fetch_add(1, Ordering::SeqCst))
        }

        fn validate(&self, object: &u32) -> bool {
            *object >= self.reject_below.load(Ordering::SeqCst)
        }

        fn passivate(&self, _object: &mut u32) -> Result<(), Refused> {
            if self.refuse_passivate.load(Ordering::SeqCst) {
                return Err(Refused);
            }
            Ok(())
        }

        fn destroy(&self, object: u32) {
            self.destroyed.lock().push(object);
        }
    }

    fn pool(config: PoolConfig) -> ResourcePool<Numbered> {
        ResourcePool::new(Numbered::default(), config).unwrap()
    }

    fn short_wait(max_total: usize) -> PoolConfig {
        PoolConfig {
            max_total,
            max_wait_ms: 50,
            ..PoolConfig::default()
        }
    }

    #[test]
    fn returned_object_is_reused() {
        let pool = pool(PoolConfig::default());
        let first = *pool.borrow().unwrap();
        let second = *pool.borrow().unwrap();
        assert_eq!(first, second);

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.borrowed, 0);
    }

    #[test]
    fn borrow_times_out_at_capacity() {
        let pool = pool(short_wait(1));
        let _held = pool.borrow().unwrap();

        let err = pool.borrow().err().unwrap();
        assert!(err.is_exhausted());
        match err {
            PoolError::Exhausted { waited } => assert!(waited >= Duration::from_millis(50)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(pool.stats().borrow_timeouts, 1);
    }

    #[test]
    fn waiter_wakes_when_lease_returns() {
        let pool = pool(PoolConfig {
            max_total: 1,
            max_wait_ms: 5_000,
            ..PoolConfig::default()
        });
        let held = pool.borrow().unwrap();

        thread::scope(|scope| {
            scope.spawn(move || {
                thread::sleep(Duration::from_millis(50));
                drop(held);
            });
            let lease = pool.borrow().unwrap();
            assert_eq!(*lease, 0);
        });
    }

    #[test]
    fn invalid_idle_object_is_replaced() {
        let pool = pool(PoolConfig::default());
        drop(pool.borrow().unwrap());
        pool.factory().reject_below.store(1, Ordering::SeqCst);

        let lease = pool.borrow().unwrap();
        assert_eq!(*lease, 1);
        assert_eq!(*pool.factory().destroyed.lock(), vec![0]);
        assert_eq!(pool.stats().validation_failures, 1);
    }

    #[test]
    fn failed_return_validation_destroys_object() {
        let pool = pool(PoolConfig {
            test_on_return: true,
            ..PoolConfig::default()
        });
        let lease = pool.borrow().unwrap();
        pool.factory().reject_below.store(1, Ordering::SeqCst);
        drop(lease);

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.validation_failures, 1);
        assert_eq!(*pool.factory().destroyed.lock(), vec![0]);

        // Objects that still validate go back to the idle list.
        drop(pool.borrow().unwrap());
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn lifo_and_fifo_ordering() {
        for (lifo, expected) in [(true, 1), (false, 0)] {
            let pool = pool(PoolConfig {
                lifo,
                ..PoolConfig::default()
            });
            let a = pool.borrow().unwrap();
            let b = pool.borrow().unwrap();
            drop(a);
            drop(b);
            assert_eq!(*pool.borrow().unwrap(), expected);
        }
    }

    #[test]
    fn returns_beyond_max_idle_are_destroyed() {
        let pool = pool(PoolConfig {
            max_idle: 1,
            ..PoolConfig::default()
        });
        let a = pool.borrow().unwrap();
        let b = pool.borrow().unwrap();
        drop(a);
        drop(b);

        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.total, 1);
        assert_eq!(*pool.factory().destroyed.lock(), vec![1]);
    }

    #[test]
    fn failed_create_releases_capacity() {
        let pool = pool(short_wait(1));
        pool.factory().refuse_create.store(true, Ordering::SeqCst);
        assert!(matches!(pool.borrow(), Err(PoolError::Create(Refused))));
        assert_eq!(pool.stats().total, 0);

        pool.factory().refuse_create.store(false, Ordering::SeqCst);
        assert!(pool.borrow().is_ok());
    }

    #[test]
    fn failed_passivate_destroys_object() {
        let pool = pool(PoolConfig::default());
        pool.factory().refuse_passivate.store(true, Ordering::SeqCst);
        drop(pool.borrow().unwrap());

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn invalidate_skips_idle_list() {
        let pool = pool(PoolConfig::default());
        pool.borrow().unwrap().invalidate();

        let stats = pool.stats();
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.borrowed, 0);
        assert_eq!(stats.destroyed, 1);
    }

    #[test]
    fn close_destroys_idle_and_outstanding() {
        let pool = pool(PoolConfig::default());
        let held = pool.borrow().unwrap();
        drop(pool.borrow().unwrap());
        assert_eq!(pool.stats().idle, 1);

        assert!(pool.close());
        assert!(!pool.close());
        assert!(pool.is_closed());
        assert!(pool.borrow().err().unwrap().is_closed());

        drop(held);
        let stats = pool.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.borrowed, 0);
        assert_eq!(stats.created, stats.destroyed);
    }

    #[test]
    fn close_wakes_waiters() {
        let pool = pool(PoolConfig {
            max_total: 1,
            max_wait_ms: 10_000,
            ..PoolConfig::default()
        });
        let _held = pool.borrow().unwrap();

        thread::scope(|scope| {
            let waiter = scope.spawn(|| pool.borrow().err().map(|err| err.is_closed()));
            thread::sleep(Duration::from_millis(50));
            pool.close();
            assert_eq!(waiter.join().unwrap(), Some(true));
        });
    }

    #[test]
    fn prepare_warms_up_to_caps() {
        let pool = pool(PoolConfig {
            max_total: 3,
            max_idle: 3,
            ..PoolConfig::default()
        });
        assert_eq!(pool.prepare(5).unwrap(), 3);
        assert_eq!(pool.stats().idle, 3);
    }

    #[test]
    fn evict_keeps_min_idle() {
        let pool = pool(PoolConfig {
            min_idle: 1,
            min_evictable_idle_time_ms: 0,
            ..PoolConfig::default()
        });
        pool.prepare(3).unwrap();

        assert_eq!(pool.evict(), 2);
        let stats = pool.stats();
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn evict_leaves_recent_objects() {
        let pool = pool(PoolConfig::default());
        pool.prepare(2).unwrap();
        assert_eq!(pool.evict(), 0);
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn evict_tops_up_min_idle() {
        let pool = pool(PoolConfig {
            min_idle: 2,
            ..PoolConfig::default()
        });
        pool.evict();
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn test_while_idle_drops_broken_objects() {
        let pool = pool(PoolConfig {
            test_while_idle: true,
            ..PoolConfig::default()
        });
        pool.prepare(3).unwrap();
        pool.factory().reject_below.store(2, Ordering::SeqCst);

        assert_eq!(pool.evict(), 2);
        assert_eq!(pool.stats().idle, 1);
        assert_eq!(*pool.borrow().unwrap(), 2);
    }

    #[test]
    fn evictor_thread_sweeps_idle_objects() {
        let pool = pool(PoolConfig {
            time_between_eviction_runs_ms: Some(10),
            min_evictable_idle_time_ms: 0,
            ..PoolConfig::default()
        });
        pool.prepare(2).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while pool.stats().idle > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(pool.stats().idle, 0);
        assert!(pool.close());
    }
}
