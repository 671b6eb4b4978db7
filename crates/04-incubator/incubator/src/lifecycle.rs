use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};

use codec::SerializerFactory;

use crate::incubator::Incubator;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Pools are being built; nothing may be incubated yet.
    Uninitialized = 0,
    Ready = 1,
    /// Terminal. Both pools have been closed.
    Closed = 2,
}

impl LifecycleState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Ready,
            _ => LifecycleState::Closed,
        }
    }
}

/// Lock-free tri-state cell. Transitions only move forward.
pub(crate) struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(LifecycleState::Uninitialized as u8))
    }

    pub(crate) fn load(&self) -> LifecycleState {
        LifecycleState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn mark_ready(&self) -> bool {
        self.0
            .compare_exchange(
                LifecycleState::Uninitialized as u8,
                LifecycleState::Ready as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Moves to `Closed`. Only the call that made the transition gets true.
    pub(crate) fn close(&self) -> bool {
        self.0.swap(LifecycleState::Closed as u8, Ordering::AcqRel) != LifecycleState::Closed as u8
    }
}

/// Shuts the incubator down when dropped, on every exit path of a scope.
///
/// Derefs to the incubator so the guarded scope can keep using it.
#[must_use = "the incubator shuts down as soon as the guard is dropped"]
pub struct ShutdownGuard<'a, F: SerializerFactory> {
    incubator: &'a Incubator<F>,
}

impl<'a, F: SerializerFactory> ShutdownGuard<'a, F> {
    pub(crate) fn new(incubator: &'a Incubator<F>) -> Self {
        Self { incubator }
    }
}

impl<F: SerializerFactory> Deref for ShutdownGuard<'_, F> {
    type Target = Incubator<F>;

    fn deref(&self) -> &Self::Target {
        self.incubator
    }
}

impl<F: SerializerFactory> Drop for ShutdownGuard<'_, F> {
    fn drop(&mut self) {
        self.incubator.shutdown();
    }
}
