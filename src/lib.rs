//! Deferred futures with callback chaining.
//!
//! A [`Future`] starts empty and is settled exactly once, to a success
//! value or a failure reason. Any number of observers may chain off it
//! with [`then`](Future::then) / [`fail`](Future::fail) before or after
//! settlement; callbacks are dispatched in registration order through an
//! injected [`Scheduler`], never synchronously with the call that
//! registered them. Settling with another future (or any [`Thenable`])
//! adopts its eventual outcome, flattening chains of any depth.
//!
//! # Examples
//!
//! ```
//! use future_out::{deferred, Resolution, TaskQueue};
//!
//! let queue = TaskQueue::new();
//! let (settler, future) = deferred::<i32, String>(queue.clone());
//! let doubled = future.then(|v| Ok(Resolution::Value(v * 2)));
//! settler.resolve(21);
//! queue.run();
//! assert_eq!(doubled.result(), Some(Ok(42)));
//! ```
//!
//! Settled futures can also be awaited directly:
//!
//! ```
//! use future_out::{deferred, TaskQueue};
//! use futures::executor::block_on;
//!
//! let queue = TaskQueue::new();
//! let (settler, future) = deferred::<&str, String>(queue.clone());
//! settler.resolve("ready");
//! queue.run();
//! assert_eq!(block_on(future), Ok("ready"));
//! ```

pub use future::Future;
pub use pair::{deferred, Settler};
pub use queue::{Scheduler, Task, TaskQueue};
pub use thenable::{Handled, Resolution, SettleFn, Settlement, Subscribe, Thenable};

pub mod future;
pub mod gate;
pub mod pair;
pub mod queue;
pub mod thenable;

use thiserror::Error;

/// Errors minted by the resolution procedure itself. Every other failure
/// travels through the generic reason channel untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A future was used as its own settlement value.
    #[error("future cannot be settled with itself")]
    SelfResolution,
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

/// Contract version, exposed as metadata only.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
