//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the controller.
//! All types derive Serde traits for deserialization from config files.

use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration for the ingress controller.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log destination: `stderr`, `stdout` or a file path.
    pub log_output: String,

    /// Control-plane HTTP listen address (e.g. ":8080", "127.0.0.1:8080").
    pub http_listen: String,

    /// Expose the `/debug/status` endpoint.
    pub enable_profiling: bool,

    /// Cluster client options.
    pub kubernetes: KubernetesConfig,

    /// Gateway admin API settings.
    pub apisix: ApisixConfig,

    /// Startup and shutdown timing.
    pub lifecycle: LifecycleConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_output: "stderr".to_string(),
            http_listen: ":8080".to_string(),
            enable_profiling: true,
            kubernetes: KubernetesConfig::default(),
            apisix: ApisixConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Copy of the configuration that is safe to log.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.apisix.admin_key.is_empty() {
            config.apisix.admin_key = "******".to_string();
        }
        config
    }

    /// Resolve `http_listen` into a socket address.
    pub fn listen_address(&self) -> Result<SocketAddr, AddrParseError> {
        parse_listen_address(&self.http_listen)
    }
}

/// Parse a listen address. A bare `:port` binds every interface.
pub fn parse_listen_address(raw: &str) -> Result<SocketAddr, AddrParseError> {
    let raw = raw.trim();
    match raw.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}").parse(),
        None => raw.parse(),
    }
}

/// Kubernetes client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct KubernetesConfig {
    /// Path to a kubeconfig file. Empty means in-cluster / inferred config.
    pub kubeconfig: String,

    /// Interval at which informers re-deliver their cached objects.
    #[serde(with = "duration")]
    pub resync_interval: Duration,
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            kubeconfig: String::new(),
            resync_interval: Duration::from_secs(60),
        }
    }
}

/// Gateway admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct ApisixConfig {
    /// Base URL of the admin API (e.g. "http://apisix-service:9180/apisix/admin").
    pub base_url: String,

    /// Key used to authorize admin API calls.
    pub admin_key: String,
}

/// Startup ordering and shutdown timing.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Warm-up delay before custom resource informers begin delivering events.
    #[serde(with = "duration")]
    pub custom_resource_delay: Duration,

    /// How long draining waits for background tasks. Zero exits immediately.
    #[serde(with = "duration")]
    pub shutdown_grace_period: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            custom_resource_delay: Duration::from_secs(10),
            shutdown_grace_period: Duration::from_secs(10),
        }
    }
}
