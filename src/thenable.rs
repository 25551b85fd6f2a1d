//! The adoption vocabulary: what a future may be settled with, and how a
//! foreign future-like source hands its eventual outcome over.
//!
//! Whether a settlement value behaves like a future is decided by a single
//! one-shot inspection ([`Thenable::into_resolution`]) whose failure is
//! itself a rejection path. The inspection yields a [`Resolution`]: a plain
//! value, a sibling [`Future`] to chain from, or an opaque [`Subscribe`]
//! source to adopt.

use crate::future::Future;

/// A value a future can be resolved with.
pub enum Resolution<T, E> {
    /// An immediate success value.
    Value(T),
    /// Another future of this crate; its eventual outcome is adopted.
    Chain(Future<T, E>),
    /// A foreign future-like source; its first settlement is adopted.
    Adopt(Box<dyn Subscribe<T, E>>),
}

/// A full settlement command: resolve with a [`Resolution`], or reject
/// outright with a reason. Adoption forgets which channel it arrived on;
/// a future-like source settles the adopter with whatever it produces.
pub enum Settlement<T, E> {
    Resolve(Resolution<T, E>),
    Reject(E),
}

/// What a `then`-style handler returns: the downstream resolution, or the
/// handler's own failure (`Err` rejects the downstream future).
pub type Handled<T, E> = Result<Resolution<T, E>, E>;

/// The settle callback handed to a [`Subscribe`] source. It may be invoked
/// any number of times; only the first invocation has effect.
pub type SettleFn<T, E> = Box<dyn FnMut(Settlement<T, E>) + Send>;

/// A foreign future-like source of a settlement.
///
/// `subscribe` consumes the source and arranges for `settle` to be called
/// with its outcome. Returning `Err` before `settle` was invoked rejects
/// the adopting future with the carried reason; returning `Err` after a
/// settlement is swallowed, since the settlement already happened.
pub trait Subscribe<T, E>: Send {
    fn subscribe(self: Box<Self>, settle: SettleFn<T, E>) -> Result<(), E>;
}

/// One-shot inspection of a settlement value.
pub trait Thenable<T, E> {
    /// Classifies `self` as a [`Resolution`]. `Err` means the inspection
    /// itself failed and becomes a rejection with the carried reason.
    fn into_resolution(self) -> Result<Resolution<T, E>, E>;
}

impl<T, E> Thenable<T, E> for Future<T, E> {
    fn into_resolution(self) -> Result<Resolution<T, E>, E> {
        Ok(Resolution::Chain(self))
    }
}

impl<T, E> Thenable<T, E> for Resolution<T, E> {
    fn into_resolution(self) -> Result<Resolution<T, E>, E> {
        Ok(self)
    }
}

impl<T, E> Thenable<T, E> for Box<dyn Subscribe<T, E>> {
    fn into_resolution(self) -> Result<Resolution<T, E>, E> {
        Ok(Resolution::Adopt(self))
    }
}
