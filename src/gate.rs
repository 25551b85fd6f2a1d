use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shareable one-shot latch.
///
/// Wherever an external callback-supplying API might invoke a continuation
/// more than once, the first [`claim`](Gate::claim) wins and every later
/// claim reports `false`.
#[derive(Debug, Clone, Default)]
pub struct Gate {
    claimed: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` exactly once across all clones of this gate.
    pub fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }
}
