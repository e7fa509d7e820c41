//! Control-plane HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace layer, graceful shutdown)
//!     → handlers.rs
//!         /healthz       → run state
//!         /metrics       → Prometheus recorder
//!         /debug/status  → informer and controller snapshots
//! ```

pub mod handlers;
pub mod server;

pub use server::{build_router, AppState, ControlPlaneServer, ServerError};
