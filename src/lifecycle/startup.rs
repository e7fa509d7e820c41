//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration, then initialize logging
//! - Bind the control-plane listener before any watcher runs
//! - Start the core watchers in line and schedule the custom resource watchers
//! - Wait for termination, then broadcast shutdown and drain background tasks
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A startup failure after watchers began fires shutdown before returning
//! - The drain is bounded by `shutdown_grace_period`; zero skips the wait

use std::future::Future;
use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};
use tokio_util::task::TaskTracker;

use crate::cli::IngressArgs;
use crate::config::{ConfigError, ControllerConfig};
use crate::controller::ControllerSet;
use crate::http::{AppState, ControlPlaneServer, ServerError};
use crate::informer::{EventSource, InformerError, ResourceKind, SharedInformerFactory};
use crate::lifecycle::{
    Shutdown, TerminationSignal, WatcherGroup, WatcherStartSequencer, CORE_GROUP,
    CUSTOM_RESOURCE_GROUP,
};
use crate::observability::logging::{self, LoggingError};
use crate::observability::metrics::{self, PodIdentity};

/// Phase of the process, observable by the control plane and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Initializing,
    Starting,
    Running,
    Draining,
    Terminated,
}

/// Fatal error before the controller reaches `Running`.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("failed to show configuration: {0}")]
    ShowConfig(#[source] serde_json::Error),

    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("failed to initialize kube informers: {0}")]
    Informer(#[from] InformerError),

    #[error("failed to parse listen address: {0}")]
    ListenAddress(#[source] AddrParseError),

    #[error("failed to launch API server: {0}")]
    Server(#[from] ServerError),
}

/// Fatal error while `Running`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("API server failed: {0}")]
    Server(#[from] ServerError),

    #[error("API server task failed: {0}")]
    ServerTask(#[from] JoinError),
}

/// Resolve configuration and install the logger.
///
/// Nothing runs in the background yet, so a failure here needs no cleanup.
pub fn initialize(args: &IngressArgs) -> Result<Arc<ControllerConfig>, StartupError> {
    let config = args.resolve_config()?;
    logging::init_logging(&config.log_level, &config.log_output)?;

    let shown = serde_json::to_string(&config.redacted()).map_err(StartupError::ShowConfig)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Ingress controller started");
    tracing::info!(config = %shown, "Using configuration");

    Ok(Arc::new(config))
}

/// Owns the process-wide shutdown, task tracker and run state.
pub struct Orchestrator {
    config: Arc<ControllerConfig>,
    source: Arc<dyn EventSource>,
    shutdown: Shutdown,
    tracker: TaskTracker,
    state: watch::Sender<RunState>,
    origin: Instant,
    metrics: PrometheusHandle,
}

impl Orchestrator {
    /// `origin` is process start; the custom resource warm-up delay and the
    /// reported uptime are measured from it.
    pub fn new(config: Arc<ControllerConfig>, source: Arc<dyn EventSource>, origin: Instant) -> Self {
        let (state, _) = watch::channel(RunState::Initializing);
        Self {
            config,
            source,
            shutdown: Shutdown::new(),
            tracker: TaskTracker::new(),
            state,
            origin,
            metrics: metrics::init_metrics(),
        }
    }

    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Bring up the control plane and both watcher groups.
    pub async fn start(self) -> Result<RunningOrchestrator, StartupError> {
        self.state.send_replace(RunState::Starting);

        let address = self
            .config
            .listen_address()
            .map_err(StartupError::ListenAddress)?;
        let resync = self.config.kubernetes.resync_interval;
        let controllers = Arc::new(ControllerSet::new());
        let core = Arc::new(SharedInformerFactory::new(CORE_GROUP, self.source.clone(), resync));
        // Custom resources are never resynced, only endpoints are.
        let custom = Arc::new(SharedInformerFactory::new(
            CUSTOM_RESOURCE_GROUP,
            self.source.clone(),
            Duration::ZERO,
        ));

        let app_state = AppState {
            run_state: self.state.subscribe(),
            metrics: self.metrics.clone(),
            informers: vec![core.clone(), custom.clone()],
            controllers: controllers.clone(),
            started_at: self.origin,
        };
        let server = ControlPlaneServer::bind(address, app_state, self.config.enable_profiling).await?;
        let local_addr = server
            .local_addr()
            .map_err(|source| ServerError::Bind { address, source })?;

        metrics::record_leader(&PodIdentity::from_env(), true);

        let sequencer = WatcherStartSequencer::new(
            self.origin,
            self.shutdown.subscribe(),
            self.tracker.clone(),
        );

        let mut core_group = WatcherGroup::new(CORE_GROUP, core.clone());
        if let Some(handler) = controllers.handler(ResourceKind::Endpoints) {
            core_group = core_group.watch(ResourceKind::Endpoints, handler);
        }
        if let Err(e) = sequencer.start_now(core_group) {
            self.state.send_replace(RunState::Terminated);
            return Err(e.into());
        }

        let mut custom_group = WatcherGroup::new(CUSTOM_RESOURCE_GROUP, custom.clone())
            .with_delay(self.config.lifecycle.custom_resource_delay);
        for kind in ResourceKind::CUSTOM {
            if let Some(handler) = controllers.handler(kind) {
                custom_group = custom_group.watch(kind, handler);
            }
        }
        if let Err(e) = sequencer.start(custom_group) {
            tracing::error!(error = %e, "Custom resource registration failed, stopping core watchers");
            self.state.send_replace(RunState::Draining);
            self.shutdown.trigger();
            self.tracker.close();
            wait_for_tasks(&self.tracker, self.config.lifecycle.shutdown_grace_period).await;
            self.state.send_replace(RunState::Terminated);
            return Err(e.into());
        }

        let server = self.tracker.spawn(server.run(self.shutdown.subscribe()));

        self.state.send_replace(RunState::Running);
        tracing::info!(address = %local_addr, "Ingress controller running");

        Ok(RunningOrchestrator {
            config: self.config,
            shutdown: self.shutdown,
            tracker: self.tracker,
            state: self.state,
            origin: self.origin,
            local_addr,
            core,
            custom,
            controllers,
            server,
        })
    }
}

/// A started controller, waiting for termination.
pub struct RunningOrchestrator {
    config: Arc<ControllerConfig>,
    shutdown: Shutdown,
    tracker: TaskTracker,
    state: watch::Sender<RunState>,
    origin: Instant,
    local_addr: SocketAddr,
    core: Arc<SharedInformerFactory>,
    custom: Arc<SharedInformerFactory>,
    controllers: Arc<ControllerSet>,
    server: JoinHandle<Result<(), ServerError>>,
}

impl RunningOrchestrator {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn state(&self) -> watch::Receiver<RunState> {
        self.state.subscribe()
    }

    pub fn origin(&self) -> Instant {
        self.origin
    }

    pub fn core_informers(&self) -> &Arc<SharedInformerFactory> {
        &self.core
    }

    pub fn custom_resource_informers(&self) -> &Arc<SharedInformerFactory> {
        &self.custom
    }

    pub fn controllers(&self) -> &Arc<ControllerSet> {
        &self.controllers
    }

    /// Tracked background tasks still running.
    pub fn background_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Run until `termination` resolves or the control plane fails, then drain.
    ///
    /// A server that stops because shutdown was triggered elsewhere counts as
    /// a clean exit.
    pub async fn run_until<F>(mut self, termination: F) -> Result<(), RuntimeError>
    where
        F: Future<Output = TerminationSignal>,
    {
        let outcome = tokio::select! {
            signal = termination => {
                tracing::info!(signal = %signal, "Termination requested");
                Ok(())
            }
            result = &mut self.server => match result {
                Ok(Ok(())) => {
                    tracing::info!("Control plane server exited");
                    Ok(())
                }
                Ok(Err(e)) => Err(RuntimeError::Server(e)),
                Err(e) => Err(RuntimeError::ServerTask(e)),
            },
        };

        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Fatal runtime error");
        }
        self.drain().await;
        outcome
    }

    async fn drain(&self) {
        self.state.send_replace(RunState::Draining);
        if self.shutdown.trigger() {
            tracing::info!("Shutdown signal broadcast");
        }
        self.tracker.close();
        wait_for_tasks(&self.tracker, self.config.lifecycle.shutdown_grace_period).await;

        self.state.send_replace(RunState::Terminated);
        tracing::info!("Ingress controller exited");
    }
}

async fn wait_for_tasks(tracker: &TaskTracker, grace: Duration) {
    if grace.is_zero() {
        tracing::info!(remaining = tracker.len(), "Zero grace period, not waiting for background tasks");
        return;
    }
    if time::timeout(grace, tracker.wait()).await.is_err() {
        tracing::warn!(
            remaining = tracker.len(),
            grace_period = ?grace,
            "Grace period elapsed with background tasks still running"
        );
    }
}
