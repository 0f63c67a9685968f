//! The producer-facing write handle.

use std::sync::Arc;

use crate::promise::Shared;
use crate::Error;

/// The write handle a producer uses to settle its
/// [`Promise`](crate::Promise).
///
/// The first `resolve` or `reject` wins; every later call, from any
/// thread, is a no-op. Handles are cheap to clone, so racing producers can
/// each hold one and settle defensively.
pub struct PromiseContext<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for PromiseContext<T> {
    fn clone(&self) -> Self {
        PromiseContext {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> PromiseContext<T> {
    pub(crate) fn new(shared: Arc<Shared<T>>) -> Self {
        PromiseContext { shared }
    }

    /// Fulfills the owning promise with `value` if it is still pending:
    /// runs the registered continuations in order and wakes every blocked
    /// [`complete`](crate::Promise::complete) caller. No-op once settled.
    pub fn resolve(&self, value: T) {
        self.shared.settle(Ok(value));
    }

    /// Rejects the owning promise with `error`. Symmetric to
    /// [`resolve`](PromiseContext::resolve); no-op once settled.
    pub fn reject(&self, error: Error) {
        self.shared.settle(Err(error));
    }

    /// Splits the handle into positional `(resolve, reject)` closures.
    /// Sugar over the named operations for producers written in the
    /// two-callback style; carries no semantics of its own.
    ///
    /// # Examples
    ///
    /// ```
    /// use vow::Promise;
    ///
    /// let promise = Promise::create(|context| {
    ///     let (resolve, _reject) = context.split();
    ///     resolve(40);
    /// });
    /// assert_eq!(promise.then(|it| it + 2).complete().unwrap(), 42);
    /// ```
    pub fn split(self) -> (impl Fn(T) + Send, impl Fn(Error) + Send) {
        let rejecter = self.clone();
        (
            move |value| self.resolve(value),
            move |error| rejecter.reject(error),
        )
    }
}
