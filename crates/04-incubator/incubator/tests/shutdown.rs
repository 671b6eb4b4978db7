//! Shutdown integration tests.
//! Covers idempotence, racing callers and behaviour after close.

use std::sync::{Arc, Barrier};
use std::thread;

use incubator::{CountingExceptionHandler, ErrorKind, Incubator, IncubatorError, LifecycleState};

fn counted() -> (Incubator, CountingExceptionHandler) {
    let counter = CountingExceptionHandler::new();
    let incubator = Incubator::builder()
        .exception_handler(counter.clone())
        .build()
        .unwrap();
    (incubator, counter)
}

/// Only the first call reports that it performed the shutdown.
#[test]
fn sequential_shutdown_is_idempotent() {
    let (incubator, counter) = counted();
    assert!(incubator.born(&1u32).is_some());

    assert!(incubator.shutdown());
    assert!(!incubator.shutdown());
    assert!(!incubator.shutdown());

    assert_eq!(incubator.state(), LifecycleState::Closed);
    assert!(incubator.resource_pool().is_closed());
    assert!(incubator.serializer_pool().is_closed());
    assert_eq!(counter.total(), 0);
}

/// Racing shutdowns elect exactly one winner.
#[test]
fn concurrent_shutdown_has_one_winner() {
    const CALLERS: usize = 16;
    let incubator = Arc::new(Incubator::new().unwrap());
    let start = Arc::new(Barrier::new(CALLERS));

    let handles: Vec<_> = (0..CALLERS)
        .map(|_| {
            let incubator = Arc::clone(&incubator);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                incubator.shutdown()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert!(incubator.is_closed());
}

/// After shutdown `born` yields nothing and the handler hears about it.
#[test]
fn born_after_shutdown_reports_closed() {
    let (incubator, counter) = counted();
    incubator.shutdown();

    assert_eq!(incubator.born(&"late".to_string()), None);
    assert!(matches!(
        incubator.try_born(&5u8),
        Err(IncubatorError::Closed)
    ));
    assert_eq!(counter.count(ErrorKind::Closed), 2);
    assert_eq!(counter.total(), 2);
    assert_eq!(incubator.resource_stats().created, 0);
}

/// Leaving a guarded scope early still shuts the incubator down.
#[test]
fn guard_runs_on_early_return() {
    fn first_copy(incubator: &Incubator, values: &[u16]) -> Option<u16> {
        let guard = incubator.shutdown_guard();
        for value in values {
            if let Some(copy) = guard.born(value) {
                return Some(copy);
            }
        }
        None
    }

    let incubator = Incubator::new().unwrap();
    assert_eq!(first_copy(&incubator, &[3, 4]), Some(3));
    assert!(incubator.is_closed());
}

/// A copy taken before shutdown stays valid afterwards.
#[test]
fn copies_outlive_the_incubator() {
    let copy = {
        let incubator = Incubator::new().unwrap();
        incubator.born(&vec!["a".to_string(), "b".to_string()])
    };
    assert_eq!(copy, Some(vec!["a".to_string(), "b".to_string()]));
}
