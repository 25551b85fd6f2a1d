use std::fmt;
use std::sync::Arc;

use crate::future::Future;
use crate::queue::Scheduler;
use crate::thenable::{Handled, Resolution, Settlement, Thenable};
use crate::Error;

/// The settle side of a deferred pair. Clones all settle the same future;
/// whichever settlement attempt reaches the resolution procedure first
/// wins and every later call is a no-op.
pub struct Settler<T, E> {
    future: Future<T, E>,
}

/// Produces a future together with its externally held settle handle, for
/// producers that settle a future they did not construct.
///
/// # Examples
///
/// ```
/// use future_out::{deferred, TaskQueue};
/// use futures::executor::block_on;
/// use std::thread;
///
/// let queue = TaskQueue::new();
/// let (settler, future) = deferred::<String, String>(queue.clone());
/// let waiter = thread::spawn(move || {
///     block_on(async {
///         println!("received {:?}", future.await);
///     })
/// });
/// settler.resolve("hi".into());
/// queue.run();
/// waiter.join().expect("the waiter thread has panicked");
/// ```
pub fn deferred<T, E>(scheduler: Arc<dyn Scheduler>) -> (Settler<T, E>, Future<T, E>)
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Error> + 'static,
{
    let future = Future::pending(scheduler);
    (
        Settler {
            future: future.clone(),
        },
        future,
    )
}

impl<T, E> Clone for Settler<T, E> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Settler<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("future", &self.future)
            .finish()
    }
}

impl<T, E> Settler<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Error> + 'static,
{
    /// Schedules fulfillment with a plain value.
    pub fn resolve(&self, value: T) {
        self.future
            .schedule_attempt(Settlement::Resolve(Resolution::Value(value)));
    }

    /// Schedules rejection with a reason.
    pub fn reject(&self, reason: E) {
        self.future.schedule_attempt(Settlement::Reject(reason));
    }

    /// Schedules settlement from a future-like source. The source is
    /// inspected once; an inspection failure becomes a rejection, a
    /// future-like classification is adopted (flattened), anything else
    /// fulfills directly.
    pub fn resolve_with<S>(&self, source: S)
    where
        S: Thenable<T, E>,
    {
        match source.into_resolution() {
            Ok(resolution) => self
                .future
                .schedule_attempt(Settlement::Resolve(resolution)),
            Err(reason) => self.future.schedule_attempt(Settlement::Reject(reason)),
        }
    }

    /// Schedules settlement from a handler result.
    pub fn settle(&self, handled: Handled<T, E>) {
        match handled {
            Ok(resolution) => self
                .future
                .schedule_attempt(Settlement::Resolve(resolution)),
            Err(reason) => self.future.schedule_attempt(Settlement::Reject(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::deferred;
    use crate::queue::TaskQueue;

    #[test]
    fn every_clone_settles_the_same_future() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let other = settler.clone();
        other.resolve(9);
        queue.run();
        assert_eq!(future.result(), Some(Ok(9)));
    }

    #[test]
    fn nothing_settles_before_the_queue_runs() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        settler.resolve(1);
        assert!(future.is_pending());
        queue.run();
        assert!(!future.is_pending());
    }
}
