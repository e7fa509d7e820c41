//! Control-plane HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with the health, metrics and debug handlers
//! - Bind the listen address (failure is a startup error)
//! - Serve until the shutdown signal fires, then stop gracefully

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;

use crate::controller::ControllerSet;
use crate::http::handlers;
use crate::informer::SharedInformerFactory;
use crate::lifecycle::{RunState, ShutdownSignal};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub run_state: watch::Receiver<RunState>,
    pub metrics: PrometheusHandle,
    pub informers: Vec<Arc<SharedInformerFactory>>,
    pub controllers: Arc<ControllerSet>,
    pub started_at: Instant,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server terminated abnormally: {0}")]
    Serve(#[source] io::Error),
}

/// HTTP server for health, metrics and debug endpoints.
pub struct ControlPlaneServer {
    listener: TcpListener,
    router: Router,
}

impl ControlPlaneServer {
    /// Bind `address` and build the router. `/debug/status` is only routed
    /// when `enable_profiling` is set.
    pub async fn bind(
        address: SocketAddr,
        state: AppState,
        enable_profiling: bool,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind { address, source })?;

        Ok(Self {
            listener,
            router: build_router(state, enable_profiling),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.listener.local_addr().map_err(ServerError::Serve)?;
        tracing::info!(address = %addr, "Control plane server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Control plane server received shutdown signal");
            })
            .await
            .map_err(ServerError::Serve)?;

        tracing::info!("Control plane server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState, enable_profiling: bool) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics));
    if enable_profiling {
        router = router.route("/debug/status", get(handlers::debug_status));
    }
    router.with_state(state).layer(TraceLayer::new_for_http())
}
