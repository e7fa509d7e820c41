//! Shutdown coordination for the controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Coordinator for graceful shutdown.
///
/// A one-shot, one-way broadcast: armed on creation, fired at most once,
/// observed by any number of tasks. Observers that subscribe after the fire
/// still see it.
#[derive(Debug, Clone)]
pub struct Shutdown {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl Shutdown {
    /// Create a new, armed shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            token: self.token.clone(),
        }
    }

    /// Trigger the shutdown signal.
    ///
    /// Returns `true` for the call that fired it; later calls are no-ops.
    pub fn trigger(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of [`Shutdown`], handed to every background task.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    /// Wait until shutdown has been triggered.
    pub async fn recv(&self) {
        self.token.cancelled().await
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }
}
