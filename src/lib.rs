//! APISIX ingress controller library

pub mod cli;
pub mod config;
pub mod controller;
pub mod http;
pub mod informer;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ControllerConfig;
pub use http::ControlPlaneServer;
pub use lifecycle::{Orchestrator, Shutdown};
