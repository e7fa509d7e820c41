//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! command line flags ──┐
//!                      ├→ cli.rs (flags → ControllerConfig)
//! config file ─────────┘→ loader.rs (JSON / YAML / TOML → ControllerConfig)
//!     → validation.rs (semantic checks)
//!     → ControllerConfig (validated, immutable)
//!     → shared via Arc to the orchestrator and every subsystem
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload path
//! - A config file, when given, wins over every other flag
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigFormat};
pub use schema::{ApisixConfig, ControllerConfig, KubernetesConfig, LifecycleConfig};
pub use validation::{validate_config, ValidationError};
