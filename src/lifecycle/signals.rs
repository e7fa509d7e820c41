//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGINT and SIGTERM
//! - Translate the first of them into a termination request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are installed during startup so a failure is a startup error
//! - Every other signal keeps its default disposition

use std::fmt;
use std::io;

/// The OS notification that requested termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => f.write_str("SIGINT"),
            TerminationSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Process-wide source of termination notifications.
#[cfg(unix)]
pub struct SignalSource {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl SignalSource {
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Wait for SIGINT or SIGTERM.
    pub async fn recv(&mut self) -> TerminationSignal {
        let signal = tokio::select! {
            _ = self.interrupt.recv() => TerminationSignal::Interrupt,
            _ = self.terminate.recv() => TerminationSignal::Terminate,
        };
        tracing::info!(signal = %signal, "Signal received");
        signal
    }
}

#[cfg(not(unix))]
pub struct SignalSource {
    _private: (),
}

#[cfg(not(unix))]
impl SignalSource {
    pub fn install() -> io::Result<Self> {
        Ok(Self { _private: () })
    }

    /// Wait for Ctrl-C.
    pub async fn recv(&mut self) -> TerminationSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
        }
        tracing::info!(signal = %TerminationSignal::Interrupt, "Signal received");
        TerminationSignal::Interrupt
    }
}
