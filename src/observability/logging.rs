//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem from the configured level and output
//! - Route output to stderr, stdout or an append-only file
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` directives, when present, refine the configured level
//! - Construction failures are reported, never panicked on

use std::fs::OpenOptions;
use std::sync::Mutex;

use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log level {0:?} (expected trace, debug, info, warn or error)")]
    InvalidLevel(String),

    #[error("failed to open log output {path:?}: {source}")]
    Output {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to install log subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Parse a log level name.
pub fn parse_level(level: &str) -> Result<LevelFilter, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" | "warning" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Where log lines are written, resolved from `log_output`.
enum Output {
    Stderr,
    Stdout,
    File(std::fs::File),
}

impl Output {
    fn open(target: &str) -> Result<Self, LoggingError> {
        match target.trim() {
            "" | "stderr" => Ok(Self::Stderr),
            "stdout" => Ok(Self::Stdout),
            path => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Self::File)
                .map_err(|source| LoggingError::Output {
                    path: path.to_string(),
                    source,
                }),
        }
    }

    fn into_writer(self) -> (BoxMakeWriter, bool) {
        match self {
            Output::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
            Output::Stdout => (BoxMakeWriter::new(std::io::stdout), true),
            Output::File(file) => (BoxMakeWriter::new(Mutex::new(file)), false),
        }
    }
}

/// Install the global tracing subscriber.
pub fn init_logging(level: &str, output: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let (writer, ansi) = Output::open(output)?.into_writer();

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi),
        )
        .try_init()?;

    Ok(())
}
