//! Command line interface.
//!
//! The controller runs from either a configuration file or command line
//! options. When `--config-path` is given, every other option is ignored.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::{
    load_config, validate_config, ApisixConfig, ConfigError, ControllerConfig, KubernetesConfig,
    LifecycleConfig,
};

#[derive(Parser, Debug)]
#[command(name = "ingress-controller", version)]
#[command(about = "Mirror cluster routing resources into an APISIX gateway", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Launch the ingress controller
    ///
    /// Run from a configuration file with `--config-path /path/to/config.yaml`,
    /// or from command line options such as
    /// `--apisix-base-url http://apisix-service:9180/apisix/admin --kubeconfig /path/to/kubeconfig`.
    ///
    /// Outside the cluster `--kubeconfig` must point at a kubeconfig file;
    /// inside the cluster leave it empty and in-cluster configuration is used.
    Ingress(IngressArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngressArgs {
    /// Configuration file path (.json, .yaml, .yml or .toml)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Error log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Error log output: stderr, stdout or a file path
    #[arg(long, default_value = "stderr")]
    pub log_output: String,

    /// The HTTP server listen address
    #[arg(long, default_value = ":8080")]
    pub http_listen: String,

    /// Enable the debug status endpoint at host:port/debug/status
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub enable_profiling: bool,

    /// Kubernetes configuration file (by default in-cluster configuration is used)
    #[arg(long, default_value = "")]
    pub kubeconfig: String,

    /// The controller resync interval, the minimum is 30s
    #[arg(long, default_value = "1m", value_parser = humantime::parse_duration)]
    pub resync_interval: Duration,

    /// The base URL of the APISIX admin API
    #[arg(long, default_value = "")]
    pub apisix_base_url: String,

    /// Admin key used to authorize APISIX admin API calls
    #[arg(long, default_value = "")]
    pub apisix_admin_key: String,

    /// Warm-up delay before custom resource informers start delivering events
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub custom_resource_delay: Duration,

    /// How long shutdown waits for background tasks to stop (0s to skip)
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    pub shutdown_grace_period: Duration,
}

impl IngressArgs {
    /// Build a configuration from the flags alone.
    pub fn to_config(&self) -> ControllerConfig {
        ControllerConfig {
            log_level: self.log_level.clone(),
            log_output: self.log_output.clone(),
            http_listen: self.http_listen.clone(),
            enable_profiling: self.enable_profiling,
            kubernetes: KubernetesConfig {
                kubeconfig: self.kubeconfig.clone(),
                resync_interval: self.resync_interval,
            },
            apisix: ApisixConfig {
                base_url: self.apisix_base_url.clone(),
                admin_key: self.apisix_admin_key.clone(),
            },
            lifecycle: LifecycleConfig {
                custom_resource_delay: self.custom_resource_delay,
                shutdown_grace_period: self.shutdown_grace_period,
            },
        }
    }

    /// Produce the validated configuration for this run.
    pub fn resolve_config(&self) -> Result<ControllerConfig, ConfigError> {
        if let Some(path) = &self.config_path {
            return load_config(path);
        }
        let config = self.to_config();
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}
