//! Run interruption flag
//!
//! Ctrl+C must not tear a half-written manifest row, so the signal handler
//! only raises a sticky flag here and the pipeline polls it between
//! observations, finishing the row in flight before stopping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared handle to the run's interruption flag.
pub type SharedShutdown = Arc<ShutdownCoordinator>;

/// Sticky stop flag raised by the signal handler and polled by the pipeline.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    stop_requested: AtomicBool,
}

impl ShutdownCoordinator {
    /// Create a coordinator with the flag lowered.
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
        }
    }

    /// Create a new shared coordinator wrapped in [`Arc`].
    pub fn shared() -> SharedShutdown {
        Arc::new(Self::new())
    }

    /// Raise the flag. Once raised it never clears for the life of the run.
    pub fn request_shutdown(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}
