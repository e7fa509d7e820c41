//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log sink (stderr, stdout or file)
//!     → /metrics on the control-plane server (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
