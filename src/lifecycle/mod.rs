//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Initialize logging → Bind control plane
//!     → Start core watchers → Schedule custom resource watchers
//!
//! Sequencing (sequencer.rs):
//!     Register handlers → Start now, or after the warm-up delay
//!
//! Shutdown (shutdown.rs):
//!     Trigger once → Every task observes → Drain tracked tasks → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then logging, then listener, then watchers
//! - Ordered shutdown: fire signal, stop serving, drain background tasks
//! - Drain is bounded by a grace period, leftover tasks are abandoned

pub mod sequencer;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use sequencer::{WatcherGroup, WatcherStartSequencer, CORE_GROUP, CUSTOM_RESOURCE_GROUP};
pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::{SignalSource, TerminationSignal};
pub use startup::{
    initialize, Orchestrator, RunState, RunningOrchestrator, RuntimeError, StartupError,
};
