//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (resync interval, listen address)
//! - Require the gateway admin endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ControllerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::config::schema::{parse_listen_address, ControllerConfig};

/// Smallest accepted informer resync interval.
pub const MIN_RESYNC_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("controller resync interval too small: {} (minimum {})", humantime::format_duration(*.actual), humantime::format_duration(*.minimum))]
    ResyncIntervalTooSmall { actual: Duration, minimum: Duration },

    #[error("apisix base url is required")]
    MissingBaseUrl,

    #[error("invalid apisix base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("invalid http listen address {0:?}")]
    InvalidListenAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &ControllerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.kubernetes.resync_interval < MIN_RESYNC_INTERVAL {
        errors.push(ValidationError::ResyncIntervalTooSmall {
            actual: config.kubernetes.resync_interval,
            minimum: MIN_RESYNC_INTERVAL,
        });
    }

    let base_url = config.apisix.base_url.trim();
    if base_url.is_empty() {
        errors.push(ValidationError::MissingBaseUrl);
    } else {
        match Url::parse(base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if parse_listen_address(&config.http_listen).is_err() {
        errors.push(ValidationError::InvalidListenAddress(
            config.http_listen.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> ControllerConfig {
        let mut config = ControllerConfig::default();
        config.apisix.base_url = "http://apisix-service:9180/apisix/admin".into();
        config
    }

    #[test]
    fn test_default_with_base_url_is_valid() {
        assert_eq!(validate_config(&valid_config()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = ControllerConfig::default();
        config.kubernetes.resync_interval = Duration::from_secs(5);
        config.http_listen = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::MissingBaseUrl));
        assert!(errors.contains(&ValidationError::InvalidListenAddress("nowhere".into())));
    }

    #[test]
    fn test_resync_interval_minimum_is_inclusive() {
        let mut config = valid_config();
        config.kubernetes.resync_interval = MIN_RESYNC_INTERVAL;
        assert!(validate_config(&config).is_ok());

        config.kubernetes.resync_interval = Duration::from_secs(29);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("resync interval too small"));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut config = valid_config();
        config.apisix.base_url = "ftp://apisix:9180".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::InvalidBaseUrl { .. }));

        config.apisix.base_url = "not a url".into();
        assert!(validate_config(&config).is_err());
    }
}
