//! Cooperative cancellation token.
//!
//! The migration is fully sequential, so cancellation is a plain shared
//! flag: the CLI sets it from a signal handler, the driver and replay
//! engine check it at ticket and event boundaries. No partial-ticket
//! rollback is attempted; issues already created stay on the target.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag checked between tickets and between events.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
