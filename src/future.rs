//! The settlable value container: a one-way `Pending -> Settled` state
//! machine with ordered observer dispatch and transparent adoption of
//! nested future-like sources. Settlement and dispatch always go through
//! the injected [`Scheduler`], never inline.

use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tracing::trace;

use crate::gate::Gate;
use crate::pair::{deferred, Settler};
use crate::queue::Scheduler;
use crate::thenable::{Handled, Resolution, SettleFn, Settlement};
use crate::Error;

/// A value or error that is not yet known, settled exactly once.
///
/// Handles are cheap to clone; every clone observes the same settlement.
pub struct Future<T, E> {
    inner: Arc<Mutex<Inner<T, E>>>,
    scheduler: Arc<dyn Scheduler>,
}

/// An observer reaction: consumes one clone of the outcome, at most once.
type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

struct Inner<T, E> {
    state: State<T, E>,
    /// Latched when the resolution procedure first starts processing a
    /// settlement attempt; later attempts are no-ops.
    resolving: bool,
    wakers: Vec<Waker>,
}

enum State<T, E> {
    Pending { observers: Vec<Reaction<T, E>> },
    Settled(Result<T, E>),
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.inner.lock().unwrap().state {
            State::Pending { .. } => "pending",
            State::Settled(Ok(_)) => "fulfilled",
            State::Settled(Err(_)) => "rejected",
        };
        f.debug_struct("Future").field("state", &state).finish()
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + Send + 'static,
    E: Clone + Send + From<Error> + 'static,
{
    /// Constructs a future and invokes `resolver` synchronously, exactly
    /// once, with this future's [`Settler`]. An `Err` return rejects the
    /// future unless the resolver already settled it.
    ///
    /// # Examples
    ///
    /// ```
    /// use future_out::{Future, Resolution, Settler, TaskQueue};
    ///
    /// let queue = TaskQueue::new();
    /// let future = Future::new(queue.clone(), |settler: Settler<i32, String>| {
    ///     settler.resolve(41);
    ///     Ok(())
    /// });
    /// let next = future.then(|v| Ok(Resolution::Value(v + 1)));
    /// queue.run();
    /// assert_eq!(next.result(), Some(Ok(42)));
    /// ```
    pub fn new<R>(scheduler: Arc<dyn Scheduler>, resolver: R) -> Self
    where
        R: FnOnce(Settler<T, E>) -> Result<(), E>,
    {
        let (settler, future) = deferred(scheduler);
        if let Err(reason) = resolver(settler.clone()) {
            settler.reject(reason);
        }
        future
    }

    pub(crate) fn pending(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: State::Pending {
                    observers: Vec::new(),
                },
                resolving: false,
                wakers: Vec::new(),
            })),
            scheduler,
        }
    }

    /// The settled outcome, or `None` while pending.
    pub fn result(&self) -> Option<Result<T, E>> {
        match &self.inner.lock().unwrap().state {
            State::Settled(outcome) => Some(outcome.clone()),
            State::Pending { .. } => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.inner.lock().unwrap().state, State::Pending { .. })
    }

    /// Registers a success handler and returns the downstream future of
    /// its result. A rejection passes through to the downstream future
    /// unchanged. The handler never runs before this call returns, even on
    /// an already-settled future.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Handled<U, E> + Send + 'static,
    {
        let (settler, downstream) = deferred(self.scheduler.clone());
        self.register(Box::new(move |outcome| match outcome {
            Ok(value) => settler.settle(on_fulfilled(value)),
            Err(reason) => settler.reject(reason),
        }));
        downstream
    }

    /// Registers a failure handler; a fulfillment passes through
    /// unchanged.
    pub fn fail<F>(&self, on_rejected: F) -> Future<T, E>
    where
        F: FnOnce(E) -> Handled<T, E> + Send + 'static,
    {
        let (settler, downstream) = deferred(self.scheduler.clone());
        self.register(Box::new(move |outcome| match outcome {
            Ok(value) => settler.resolve(value),
            Err(reason) => settler.settle(on_rejected(reason)),
        }));
        downstream
    }

    /// Registers both handlers at once.
    pub fn then_or_else<U, F, R>(&self, on_fulfilled: F, on_rejected: R) -> Future<U, E>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Handled<U, E> + Send + 'static,
        R: FnOnce(E) -> Handled<U, E> + Send + 'static,
    {
        let (settler, downstream) = deferred(self.scheduler.clone());
        self.register(Box::new(move |outcome| {
            let handled = match outcome {
                Ok(value) => on_fulfilled(value),
                Err(reason) => on_rejected(reason),
            };
            settler.settle(handled);
        }));
        downstream
    }

    /// Registers a side-effecting cleanup callback on both channels. The
    /// callback receives the outcome; nothing propagates from it.
    pub fn fin<F>(&self, callback: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        self.register(Box::new(callback));
    }

    /// Schedules dispatch of an observer reaction: queued if still
    /// pending, run with the outcome once settled.
    fn register(&self, reaction: Reaction<T, E>) {
        let future = self.clone();
        self.scheduler
            .schedule(Box::new(move || future.dispatch(reaction)));
    }

    fn dispatch(&self, reaction: Reaction<T, E>) {
        let outcome = {
            let mut inner = self.inner.lock().unwrap();
            match &mut inner.state {
                State::Pending { observers } => {
                    observers.push(reaction);
                    return;
                }
                State::Settled(outcome) => outcome.clone(),
            }
        };
        reaction(outcome);
    }

    /// Queues a settlement attempt on the scheduler. Only the first
    /// attempt to reach the resolution procedure has effect.
    pub(crate) fn schedule_attempt(&self, settlement: Settlement<T, E>) {
        let future = self.clone();
        self.scheduler
            .schedule(Box::new(move || future.attempt(settlement)));
    }

    fn attempt(&self, settlement: Settlement<T, E>) {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.resolving {
                trace!("settlement attempt ignored, resolution already started");
                return;
            }
            inner.resolving = true;
        }
        self.run_resolution(settlement);
    }

    /// The resolution procedure. Re-entered recursively while flattening
    /// nested sources; the `resolving` latch is checked only on entry via
    /// [`attempt`](Self::attempt).
    fn run_resolution(&self, settlement: Settlement<T, E>) {
        match settlement {
            Settlement::Reject(reason) => self.settle(Err(reason)),
            Settlement::Resolve(Resolution::Value(value)) => self.settle(Ok(value)),
            Settlement::Resolve(Resolution::Chain(other)) => {
                if Arc::ptr_eq(&self.inner, &other.inner) {
                    self.settle(Err(E::from(Error::SelfResolution)));
                    return;
                }
                trace!("adopting chained future");
                let future = self.clone();
                other.register(Box::new(move |outcome| future.settle(outcome)));
            }
            Settlement::Resolve(Resolution::Adopt(source)) => {
                trace!("adopting foreign source");
                let gate = Gate::new();
                let future = self.clone();
                let settle: SettleFn<T, E> = {
                    let gate = gate.clone();
                    Box::new(move |settlement| {
                        if gate.claim() {
                            future.run_resolution(settlement);
                        }
                    })
                };
                if let Err(reason) = source.subscribe(settle) {
                    // An error after the source settled is swallowed.
                    if gate.claim() {
                        self.settle(Err(reason));
                    }
                }
            }
        }
    }

    fn settle(&self, outcome: Result<T, E>) {
        let (reactions, wakers) = {
            let mut inner = self.inner.lock().unwrap();
            let prior = std::mem::replace(&mut inner.state, State::Settled(outcome.clone()));
            match prior {
                State::Settled(first) => {
                    // The first settlement stands.
                    inner.state = State::Settled(first);
                    return;
                }
                State::Pending { observers } => (observers, std::mem::take(&mut inner.wakers)),
            }
        };
        trace!(
            rejected = outcome.is_err(),
            observers = reactions.len(),
            "future settled"
        );
        for reaction in reactions {
            reaction(outcome.clone());
        }
        for waker in wakers {
            waker.wake();
        }
    }
}

impl<T, E> std::future::Future for Future<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock().unwrap();
        if let State::Settled(outcome) = &inner.state {
            return Poll::Ready(outcome.clone());
        }
        inner.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::Future;
    use crate::pair::{deferred, Settler};
    use crate::queue::TaskQueue;
    use crate::thenable::{Handled, Resolution};
    use crate::Error;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn then_maps_the_fulfillment_value() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let next = future.then(|v| Ok(Resolution::Value(v + 1)));
        settler.resolve(42);
        queue.run();
        assert_eq!(next.result(), Some(Ok(43)));
    }

    #[test]
    fn rejection_passes_through_then() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let chained = future
            .then(|v| Ok(Resolution::Value(v + 1)))
            .then(|v| Ok(Resolution::Value(v + 1)));
        settler.reject("boom".into());
        queue.run();
        assert_eq!(chained.result(), Some(Err("boom".into())));
    }

    #[test]
    fn fulfillment_passes_through_fail() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let chained = future.fail(|reason| Ok(Resolution::Value(reason.len() as i32)));
        settler.resolve(5);
        queue.run();
        assert_eq!(chained.result(), Some(Ok(5)));
    }

    #[test]
    fn handler_error_rejects_downstream() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let failed = future.then(|_| -> Handled<i32, String> { Err("x".into()) });
        settler.resolve(1);
        queue.run();
        assert_eq!(failed.result(), Some(Err("x".into())));
    }

    #[test]
    fn handler_returning_a_future_flattens() {
        let queue = TaskQueue::new();
        let (inner_settler, inner) = deferred::<i32, String>(queue.clone());
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let chained = future.then(move |_| Ok(Resolution::Chain(inner)));
        settler.resolve(0);
        inner_settler.resolve(7);
        queue.run();
        assert_eq!(chained.result(), Some(Ok(7)));
    }

    #[test]
    fn observers_dispatch_in_registration_order() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let order = order.clone();
            future.then(move |v| {
                order.lock().unwrap().push(n);
                Ok(Resolution::Value(v))
            });
        }
        settler.resolve(0);
        queue.run();
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn handler_never_runs_before_registration_returns() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        settler.resolve(1);
        queue.run();
        assert_eq!(future.result(), Some(Ok(1)));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        future.then(move |v| {
            flag.store(true, Ordering::SeqCst);
            Ok(Resolution::Value(v))
        });
        assert!(!ran.load(Ordering::SeqCst));
        queue.run();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn first_settlement_sticks() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, String>(queue.clone());
        settler.resolve(1);
        settler.reject("late".into());
        settler.resolve(2);
        queue.run();
        assert_eq!(future.result(), Some(Ok(1)));
    }

    #[test]
    fn settling_with_itself_rejects() {
        let queue = TaskQueue::new();
        let (settler, future) = deferred::<i32, Error>(queue.clone());
        settler.resolve_with(future.clone());
        queue.run();
        assert_eq!(future.result(), Some(Err(Error::SelfResolution)));
    }

    #[test]
    fn resolver_error_rejects_the_future() {
        let queue = TaskQueue::new();
        let future = Future::new(queue.clone(), |_settler: Settler<i32, String>| {
            Err("died".into())
        });
        queue.run();
        assert_eq!(future.result(), Some(Err("died".into())));
    }

    #[test]
    fn resolver_error_after_settling_is_ignored() {
        let queue = TaskQueue::new();
        let future = Future::new(queue.clone(), |settler: Settler<i32, String>| {
            settler.resolve(3);
            Err("late".into())
        });
        queue.run();
        assert_eq!(future.result(), Some(Ok(3)));
    }
}
