//! APISIX ingress controller
//!
//! Watches cluster resources and mirrors them into an APISIX gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!   flags / config file
//!          │
//!          ▼
//!   ┌──────────────┐    ┌───────────────────────────────────────────────┐
//!   │  initialize  │───▶│                 Orchestrator                  │
//!   │config + logs │    │                                               │
//!   └──────────────┘    │  bind control plane (/healthz /metrics ...)   │
//!                       │  core group         → Endpoints, t = 0        │
//!                       │  custom-resources   → ApisixRoute, Upstream,  │
//!                       │                       Service, Tls, t = delay │
//!                       └──────────────────────┬────────────────────────┘
//!                                              │
//!   SIGINT / SIGTERM ──────────────────────────▼
//!                       fire shutdown → drain tracked tasks → exit
//! ```
//!
//! # Exit Codes
//! - `0`: clean shutdown after a termination signal
//! - `1`: fatal startup or runtime error, reported as one line on stderr

use std::fmt::Display;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::time::Instant;

use ingress_controller::cli::{Cli, Commands, IngressArgs};
use ingress_controller::informer::KubeEventSource;
use ingress_controller::lifecycle::{initialize, Orchestrator, SignalSource, StartupError};

#[tokio::main]
async fn main() -> ExitCode {
    let origin = Instant::now();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingress(args) => run_ingress(args, origin).await,
    }
}

/// `origin` is process start; the custom resource warm-up delay counts from it.
async fn run_ingress(args: IngressArgs, origin: Instant) -> ExitCode {
    let config = match initialize(&args) {
        Ok(config) => config,
        Err(e) => return die(e),
    };

    let mut signals = match SignalSource::install() {
        Ok(signals) => signals,
        Err(e) => return die(StartupError::Signals(e)),
    };

    let source = match KubeEventSource::connect(&config.kubernetes).await {
        Ok(source) => source,
        Err(e) => return die(StartupError::Informer(e)),
    };

    let running = match Orchestrator::new(config, Arc::new(source), origin).start().await {
        Ok(running) => running,
        Err(e) => return die(e),
    };

    match running.run_until(signals.recv()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => die(e),
    }
}

fn die(err: impl Display) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}
