//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_controller_is_leader` (gauge): 1 while this pod leads
//! - `ingress_controller_resource_events_total` (counter): events by kind and type
//! - `ingress_controller_informer_started` (gauge): 1 once an informer delivers
//! - `ingress_controller_watch_errors_total` (counter): watch failures by kind
//!
//! # Design Decisions
//! - One process-wide Prometheus recorder, rendered by the control-plane server
//! - Pod identity comes from the downward API environment

use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::informer::ResourceKind;

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder (once) and return a handle for rendering.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let recorder = PrometheusBuilder::new().build_recorder();
            let handle = recorder.handle();
            if metrics::set_global_recorder(recorder).is_err() {
                tracing::warn!("A metrics recorder is already installed; /metrics will be empty");
            }
            handle
        })
        .clone()
}

/// Name and namespace of the pod running the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodIdentity {
    pub name: String,
    pub namespace: String,
}

impl PodIdentity {
    /// Read `POD_NAME` and `POD_NAMESPACE`; the namespace defaults to "default".
    pub fn from_env() -> Self {
        let name = std::env::var("POD_NAME").unwrap_or_default();
        let namespace = std::env::var("POD_NAMESPACE")
            .ok()
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());
        Self { name, namespace }
    }
}

pub fn record_leader(pod: &PodIdentity, is_leader: bool) {
    metrics::gauge!(
        "ingress_controller_is_leader",
        "controller_pod" => pod.name.clone(),
        "controller_namespace" => pod.namespace.clone()
    )
    .set(if is_leader { 1.0 } else { 0.0 });
}

pub fn record_resource_event(kind: ResourceKind, event: &'static str) {
    metrics::counter!(
        "ingress_controller_resource_events_total",
        "kind" => kind.as_str(),
        "event" => event
    )
    .increment(1);
}

pub fn record_informer_started(kind: ResourceKind) {
    metrics::gauge!("ingress_controller_informer_started", "kind" => kind.as_str()).set(1.0);
}

pub fn record_watch_error(kind: ResourceKind) {
    metrics::counter!("ingress_controller_watch_errors_total", "kind" => kind.as_str())
        .increment(1);
}
