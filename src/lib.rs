//! A single-slot promise: a producer settles it exactly once, and
//! consumers chain work over the eventual value or block for it.
//!
//! [`Promise::create`] hands the producer a [`PromiseContext`]; the first
//! [`resolve`](PromiseContext::resolve) or
//! [`reject`](PromiseContext::reject) wins and every later call is a
//! no-op, so racing producers can settle defensively from any thread.
//! Consumers derive new promises with [`then`](Promise::then) and
//! [`on_catch`](Promise::on_catch), or block with
//! [`complete`](Promise::complete).
//!
//! # Examples
//!
//! ```
//! use std::thread;
//! use vow::Promise;
//!
//! let promise = Promise::create(|context| {
//!     thread::spawn(move || context.resolve(40));
//! });
//! assert_eq!(promise.then(|it| it + 2).complete().unwrap(), 42);
//! ```
//!
//! The same slot is also a [`Future`](std::future::Future):
//!
//! ```
//! use futures::executor::block_on;
//! use std::thread;
//! use vow::Promise;
//!
//! let promise = Promise::create(|context| {
//!     thread::spawn(move || context.resolve(String::from("🍓")));
//! });
//! assert_eq!(block_on(promise).unwrap(), "🍓");
//! ```

mod context;
mod promise;

pub use context::PromiseContext;
pub use promise::Promise;

use std::sync::Arc;
use thiserror::Error;

/// Why a promise rejected.
///
/// A cause is stored and forwarded as-is; the crate never looks inside
/// one. Causes clone cheaply so that every consumer of a slot can observe
/// the same rejection.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The producer, or a handler along the chain, rejected with a cause.
    #[error("{0}")]
    Rejected(Arc<dyn std::error::Error + Send + Sync>),
    /// The producer or a chained callback panicked before settling.
    #[error("promise task panicked: {0}")]
    Panicked(String),
}

impl Error {
    /// Wraps an arbitrary error value as a rejection cause.
    pub fn new<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Rejected(Arc::new(source))
    }

    /// A rejection cause carrying only a message.
    pub fn msg(message: impl Into<String>) -> Self {
        Error::Rejected(Arc::new(Message(message.into())))
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

#[cfg(test)]
mod tests {
    use super::Error;
    use std::sync::Arc;

    #[test]
    fn test_message_causes_render_bare() {
        assert_eq!(Error::msg("boom").to_string(), "boom");
    }

    #[test]
    fn test_wrapped_causes_keep_their_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        assert_eq!(Error::new(io).to_string(), "disk gone");
    }

    #[test]
    fn test_clones_share_the_same_cause() {
        let original = Error::msg("shared");
        let copy = original.clone();
        match (&original, &copy) {
            (Error::Rejected(a), Error::Rejected(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => unreachable!(),
        }
    }
}
