//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::time::Duration;

use ingress_controller::config::{ApisixConfig, ControllerConfig, LifecycleConfig};
use ingress_controller::informer::{ResourceKind, ResourceObject};

/// Valid configuration listening on an ephemeral loopback port.
pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        http_listen: "127.0.0.1:0".to_string(),
        apisix: ApisixConfig {
            base_url: "http://127.0.0.1:9180/apisix/admin".to_string(),
            admin_key: "edd1c9f034335f136f87ad84b625c8f1".to_string(),
        },
        ..ControllerConfig::default()
    }
}

/// Same as [`test_config`] with explicit lifecycle timings.
pub fn test_config_with(delay: Duration, grace: Duration) -> ControllerConfig {
    ControllerConfig {
        lifecycle: LifecycleConfig {
            custom_resource_delay: delay,
            shutdown_grace_period: grace,
        },
        ..test_config()
    }
}

pub fn endpoints(name: &str) -> ResourceObject {
    ResourceObject::new(ResourceKind::Endpoints, Some("default"), name)
}

pub fn route(name: &str) -> ResourceObject {
    ResourceObject::new(ResourceKind::ApisixRoute, Some("default"), name)
}
