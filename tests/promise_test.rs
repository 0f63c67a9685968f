use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use vow::{Error, Promise};

#[test]
fn test_resolves_across_threads() {
    let promise = Promise::create(|context| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            context.resolve(42);
        });
    });
    assert_eq!(promise.complete().unwrap(), 42);
}

#[test]
fn test_racing_settlers_record_exactly_one_outcome() {
    let (promise, context) = Promise::<usize>::pending();
    let mut settlers = Vec::new();
    for id in 0..8 {
        let context = context.clone();
        settlers.push(thread::spawn(move || {
            if id % 2 == 0 {
                context.resolve(id);
            } else {
                context.reject(Error::msg(format!("loser {id}")));
            }
        }));
    }
    for settler in settlers {
        settler.join().expect("The settler thread has panicked");
    }
    let first = promise.complete();

    // Concurrent waiters all observe that same single transition.
    let mut waiters = Vec::new();
    for _ in 0..4 {
        let promise = promise.clone();
        waiters.push(thread::spawn(move || promise.complete()));
    }
    for waiter in waiters {
        let outcome = waiter.join().expect("The waiter thread has panicked");
        match (&first, &outcome) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.to_string(), b.to_string()),
            _ => panic!("waiters observed different outcomes"),
        }
    }
}

#[test]
fn test_continuation_racing_settlement_runs_exactly_once() {
    for _ in 0..64 {
        let (promise, context) = Promise::<i32>::pending();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let settler = thread::spawn(move || context.resolve(1));
        let chained = promise.then_do(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        chained.complete().expect("settler only resolves");
        settler.join().expect("The settler thread has panicked");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_complete_after_settlement_returns_immediately() {
    let promise = Promise::resolved(5);
    let started = Instant::now();
    assert_eq!(promise.complete().unwrap(), 5);
    assert!(started.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_rejection_travels_the_whole_chain() {
    let promise: Promise<i32> = Promise::create(|context| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            context.reject(Error::msg("upstream down"));
        });
    });
    let chained = promise.then(|it| it + 1).then(|it| it * 2);
    assert_eq!(chained.complete().unwrap_err().to_string(), "upstream down");
}

#[test]
fn test_awaiting_the_promise_as_a_future() {
    let promise = Promise::create(|context| {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            context.resolve(String::from("🍓"));
        });
    });
    let value = futures::executor::block_on(promise);
    assert_eq!(value.unwrap(), "🍓");
}

#[test]
fn test_end_to_end_destructured_producer() {
    let promise = Promise::create(|context| {
        let (resolve, _reject) = context.split();
        resolve(40);
    });
    assert_eq!(promise.then(|it| it + 2).complete().unwrap(), 42);
}
