//! The consumer-facing value container and its state machine.

use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll};
use std::thread;

use crate::{Error, PromiseContext};

/// A continuation receives the settled outcome exactly once.
type Continuation<T> = Box<dyn FnOnce(Result<T, Error>) + Send>;

/// Pending holds the continuations registered so far; the terminal states
/// hold the outcome. There is no transition out of a terminal state.
enum State<T> {
    Pending(Vec<Continuation<T>>),
    Fulfilled(T),
    Rejected(Error),
}

pub(crate) struct Shared<T> {
    state: Mutex<State<T>>,
    settled: Condvar,
}

impl<T: Clone> Shared<T> {
    /// The transition-and-drain step every settlement path goes through.
    ///
    /// Exactly one caller swaps Pending for a terminal state and takes the
    /// continuation list; everyone else returns without effect.
    /// Continuations run after the lock is released, in registration
    /// order, so they are free to chain or wait on promises themselves.
    pub(crate) fn settle(&self, outcome: Result<T, Error>) {
        let drained = {
            let mut state = self.state.lock().unwrap();
            match &mut *state {
                State::Pending(continuations) => {
                    let drained = std::mem::take(continuations);
                    *state = match &outcome {
                        Ok(value) => State::Fulfilled(value.clone()),
                        Err(error) => State::Rejected(error.clone()),
                    };
                    drained
                }
                _ => return,
            }
        };
        self.settled.notify_all();
        for continuation in drained {
            continuation(outcome.clone());
        }
    }

    /// Hands `callback` the outcome: synchronously if the slot already
    /// settled, otherwise once it does. Never invoked under the state
    /// lock.
    fn on_settled(&self, callback: Continuation<T>) {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Pending(continuations) => continuations.push(callback),
            State::Fulfilled(value) => {
                let value = value.clone();
                drop(state);
                callback(Ok(value));
            }
            State::Rejected(error) => {
                let error = error.clone();
                drop(state);
                callback(Err(error));
            }
        }
    }
}

/// A single-slot container for a value that becomes available at most
/// once.
///
/// Cloning hands out another consumer handle to the same slot; every
/// handle observes the one outcome. A promise whose producer never settles
/// stays pending forever.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use vow::{Error, Promise};
///
/// let promise = Promise::create(|context| {
///     thread::spawn(move || match std::fs::read_to_string("config.toml") {
///         Ok(raw) => context.resolve(raw),
///         Err(io) => context.reject(Error::new(io)),
///     });
/// });
/// let _outcome = promise.then(|raw| raw.len()).complete();
/// ```
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    fn unsettled() -> Self {
        Promise {
            shared: Arc::new(Shared {
                state: Mutex::new(State::Pending(Vec::new())),
                settled: Condvar::new(),
            }),
        }
    }

    fn context(&self) -> PromiseContext<T> {
        PromiseContext::new(self.shared.clone())
    }

    /// A pending promise together with its write handle, for producers
    /// that do not fit the closure shape of [`create`](Promise::create).
    pub fn pending() -> (Self, PromiseContext<T>) {
        let promise = Promise::unsettled();
        let context = promise.context();
        (promise, context)
    }

    /// Creates a pending promise and invokes `producer` with its
    /// [`PromiseContext`], synchronously on the calling thread. The
    /// producer may move the context anywhere and settle later; `create`
    /// itself never blocks.
    ///
    /// A panic escaping the producer rejects the promise with
    /// [`Error::Panicked`], unless the producer already settled it; the
    /// earlier settlement wins.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::thread;
    /// use vow::Promise;
    ///
    /// let promise = Promise::create(|context| {
    ///     thread::spawn(move || context.resolve("🍓"));
    /// });
    /// assert_eq!(promise.complete().unwrap(), "🍓");
    /// ```
    pub fn create<F>(producer: F) -> Self
    where
        F: FnOnce(PromiseContext<T>),
    {
        let promise = Promise::unsettled();
        let context = promise.context();
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| producer(context))) {
            promise
                .shared
                .settle(Err(Error::Panicked(panic_message(payload))));
        }
        promise
    }

    /// Like [`create`](Promise::create), but runs the producer on its own
    /// thread. A panic on that thread rejects the promise the same way.
    pub fn spawn<F>(producer: F) -> Self
    where
        F: FnOnce(PromiseContext<T>) + Send + 'static,
    {
        let promise = Promise::unsettled();
        let context = promise.context();
        let guard = promise.context();
        thread::spawn(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| producer(context))) {
                guard.reject(Error::Panicked(panic_message(payload)));
            }
        });
        promise
    }

    /// A promise born fulfilled.
    pub fn resolved(value: T) -> Self {
        let promise = Promise::unsettled();
        promise.shared.settle(Ok(value));
        promise
    }

    /// A promise born rejected.
    pub fn rejected(error: Error) -> Self {
        let promise = Promise::unsettled();
        promise.shared.settle(Err(error));
        promise
    }

    /// Derives a new promise by applying `transform` to the fulfilled
    /// value.
    ///
    /// On an already-fulfilled promise the transform runs synchronously
    /// and the derived promise settles before `then` returns; on a pending
    /// one it runs when the promise settles. A rejection skips the
    /// transform and propagates unchanged; a panicking transform rejects
    /// the derived promise with [`Error::Panicked`].
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let promise = Promise::create(|context| context.resolve(2));
    /// let chained = promise.then(|it| it * 10).then(|it| it + 5);
    /// assert_eq!(chained.complete().unwrap(), 25);
    /// ```
    pub fn then<U, F>(&self, transform: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let derived = Promise::unsettled();
        let context = derived.context();
        self.shared.on_settled(Box::new(move |outcome| match outcome {
            Ok(value) => match catch_unwind(AssertUnwindSafe(|| transform(value))) {
                Ok(mapped) => context.resolve(mapped),
                Err(payload) => context.reject(Error::Panicked(panic_message(payload))),
            },
            Err(error) => context.reject(error),
        }));
        derived
    }

    /// Observes the fulfillment value for its side effect; the derived
    /// promise carries the original outcome forward in both directions.
    /// A panicking action rejects the derived promise.
    pub fn then_do<F>(&self, action: F) -> Promise<T>
    where
        F: FnOnce(T) + Send + 'static,
    {
        let derived = Promise::unsettled();
        let context = derived.context();
        self.shared.on_settled(Box::new(move |outcome| match outcome {
            Ok(value) => match catch_unwind(AssertUnwindSafe(|| action(value.clone()))) {
                Ok(()) => context.resolve(value),
                Err(payload) => context.reject(Error::Panicked(panic_message(payload))),
            },
            Err(error) => context.reject(error),
        }));
        derived
    }

    /// Registers a handler invoked only on rejection; fulfillment skips
    /// it. The derived promise preserves the original outcome, so chains
    /// can observe a failure without consuming it: a handled rejection
    /// stays a rejection. A panicking handler replaces the cause on the
    /// derived promise with [`Error::Panicked`].
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::{Error, Promise};
    ///
    /// let promise: Promise<i32> = Promise::rejected(Error::msg("💥"));
    /// let observed = promise.on_catch(|cause| eprintln!("failed: {cause}"));
    /// assert!(observed.complete().is_err());
    /// ```
    pub fn on_catch<F>(&self, handler: F) -> Promise<T>
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        let derived = Promise::unsettled();
        let context = derived.context();
        self.shared.on_settled(Box::new(move |outcome| match outcome {
            Ok(value) => context.resolve(value),
            Err(error) => match catch_unwind(AssertUnwindSafe(|| handler(&error))) {
                Ok(()) => context.reject(error),
                Err(payload) => context.reject(Error::Panicked(panic_message(payload))),
            },
        }));
        derived
    }

    /// Consumer-facing alias for [`on_catch`](Promise::on_catch).
    pub fn catch<F>(&self, handler: F) -> Promise<T>
    where
        F: FnOnce(&Error) + Send + 'static,
    {
        self.on_catch(handler)
    }

    /// Blocks the calling thread until the promise settles, then returns
    /// the value or the rejection cause. A settled promise returns
    /// immediately; waiting uses the settlement condvar, never a spin.
    /// Any number of threads may wait; all observe the same outcome.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::thread;
    /// use std::time::Duration;
    /// use vow::Promise;
    ///
    /// let promise = Promise::create(|context| {
    ///     thread::spawn(move || {
    ///         thread::sleep(Duration::from_millis(10));
    ///         context.resolve(7);
    ///     });
    /// });
    /// assert_eq!(promise.complete().unwrap(), 7);
    /// ```
    pub fn complete(&self) -> Result<T, Error> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            match &*state {
                State::Pending(_) => state = self.shared.settled.wait(state).unwrap(),
                State::Fulfilled(value) => return Ok(value.clone()),
                State::Rejected(error) => return Err(error.clone()),
            }
        }
    }

    /// Fulfills with every value, in input order, once every input
    /// fulfills; rejects with the first rejection observed. An empty input
    /// fulfills immediately with an empty vec.
    pub fn all(promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
        Promise::create(move |context| {
            let total = promises.len();
            if total == 0 {
                context.resolve(Vec::new());
                return;
            }
            let gathered = Arc::new(Mutex::new((vec![None; total], 0usize)));
            for (index, promise) in promises.iter().enumerate() {
                let gathered = gathered.clone();
                let context = context.clone();
                promise.shared.on_settled(Box::new(move |outcome| match outcome {
                    Ok(value) => {
                        let mut guard = gathered.lock().unwrap();
                        let (values, filled) = &mut *guard;
                        values[index] = Some(value);
                        *filled += 1;
                        if *filled == total {
                            let values = values
                                .iter_mut()
                                .map(|slot| slot.take().unwrap())
                                .collect::<Vec<_>>();
                            drop(guard);
                            context.resolve(values);
                        }
                    }
                    Err(error) => context.reject(error),
                }));
            }
        })
    }

    /// Whether the promise has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        !matches!(*self.shared.state.lock().unwrap(), State::Pending(_))
    }
}

impl<T: Clone + Send + 'static> Future for Promise<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock().unwrap();
        match &mut *state {
            State::Pending(continuations) => {
                // Every poll stores a fresh waker and settlement wakes them
                // all; waking only the most recent one loses tasks.
                let waker = cx.waker().clone();
                continuations.push(Box::new(move |_| waker.wake()));
                Poll::Pending
            }
            State::Fulfilled(value) => Poll::Ready(Ok(value.clone())),
            State::Rejected(error) => Poll::Ready(Err(error.clone())),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.shared.state.lock().unwrap() {
            State::Pending(_) => write!(f, "Promise {{ <pending> }}"),
            State::Fulfilled(value) => write!(f, "Promise {{ {:?} }}", value),
            State::Rejected(error) => write!(f, "Promise {{ <rejected> {} }}", error),
        }
    }
}

/// Best-effort rendering of a panic payload; `panic!` with a message
/// carries a `String` or `&str`, anything else is opaque.
fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => String::from("opaque panic payload"),
        },
    }
}
