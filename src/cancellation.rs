//! Cooperative cancellation, checked at the top of every long-running loop in the builder.
//!
//! This mirrors a termination-condition pattern: a small trait polled at well-known points,
//! rather than a `Future`-style cancel signal, so the same token works for both the synchronous
//! search and the `spawn_blocking` worker behind [`crate::builder::SolutionBuilder::analyze_solutions_async`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cooperative cancellation signal. Implementations are polled frequently and must be cheap.
pub trait CancellationToken {
    /// Returns true if the current operation should stop.
    fn should_cancel(&self) -> bool;
}

/// A token that never cancels. The default for callers that don't need cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToken;

impl CancellationToken for NullToken {
    fn should_cancel(&self) -> bool {
        false
    }
}

/// An `AtomicBool`-backed token that can be flipped from another thread, e.g. to cancel an
/// in-flight `analyze_solutions_async` call.
#[derive(Debug, Clone, Default)]
pub struct AtomicToken(Arc<AtomicBool>);

impl AtomicToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> AtomicToken {
        AtomicToken(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation. Visible to every clone of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl CancellationToken for AtomicToken {
    fn should_cancel(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl<T: CancellationToken + ?Sized> CancellationToken for &T {
    fn should_cancel(&self) -> bool {
        (**self).should_cancel()
    }
}
