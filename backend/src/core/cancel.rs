//! Cooperative cancellation
//!
//! One token is created per simulation and held by the orchestrator. Each
//! dispatch loop gets a [`CancellationToken::child`] of it, so stopping one
//! bank leaves the others running while cancelling the root still stops
//! everything. Blocking waits re-check their token at least every
//! [`POLL_INTERVAL`], so cancelling wakes them promptly without any thread
//! being interrupted mid-mutation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest a cancellable wait sleeps before re-checking its token
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shared cancellation flag
///
/// # Example
/// ```
/// use bank_sim_core::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_view = token.clone();
/// token.cancel();
/// assert!(worker_view.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled by its own `cancel` or by any ancestor's
    ///
    /// Cancelling the child never affects the parent.
    pub fn child(&self) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_cancelled())
    }

    /// Sleep for `duration` or until cancelled, whichever comes first
    ///
    /// Returns `true` if the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }
}
