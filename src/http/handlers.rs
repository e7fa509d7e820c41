use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::informer::{InformerSnapshot, ResourceKind};
use crate::lifecycle::RunState;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct GroupStatus {
    pub group: &'static str,
    pub started: bool,
    pub informers: Vec<InformerSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct DebugStatus {
    pub version: &'static str,
    pub state: RunState,
    pub uptime_seconds: u64,
    pub groups: Vec<GroupStatus>,
    pub controllers: BTreeMap<ResourceKind, usize>,
}

/// Liveness: healthy until shutdown begins.
pub async fn healthz(State(state): State<AppState>) -> Response {
    let run_state = *state.run_state.borrow();
    match run_state {
        RunState::Draining | RunState::Terminated => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(Health { status: "draining" }),
        )
            .into_response(),
        _ => (StatusCode::OK, Json(Health { status: "ok" })).into_response(),
    }
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    (
        [(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)],
        state.metrics.render(),
    )
        .into_response()
}

pub async fn debug_status(State(state): State<AppState>) -> Json<DebugStatus> {
    let groups = state
        .informers
        .iter()
        .map(|factory| GroupStatus {
            group: factory.name(),
            started: factory.is_started(),
            informers: factory.snapshot(),
        })
        .collect();

    Json(DebugStatus {
        version: env!("CARGO_PKG_VERSION"),
        state: *state.run_state.borrow(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        groups,
        controllers: state.controllers.cache_sizes(),
    })
}
