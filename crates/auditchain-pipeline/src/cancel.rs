//! Cooperative cancellation: checked once per line between
//! events, never mid-event. No async runtime is introduced for this — a
//! single `AtomicBool` is all a batch-like, single-threaded pipeline
//! needs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply clonable flag a long-running stage checks between lines.
///
/// Cloning shares the same underlying flag (it's an `Arc`), so a signal
/// handler or a controlling thread can call [`CancellationToken::cancel`]
/// while a stage loop elsewhere polls [`CancellationToken::is_cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn cancelling_is_visible_through_a_clone() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
