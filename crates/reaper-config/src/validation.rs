//! Configuration validation

use crate::schema::{RawConfig, RawDiscoveryConfig, RawProbeConfig};
use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Region list is empty")]
    NoRegions,

    #[error("Region name cannot be empty")]
    EmptyRegion,

    #[error("Duplicate region: {0}")]
    DuplicateRegion(String),

    #[error("Invalid health listen address '{value}': {message}")]
    InvalidListenAddress { value: String, message: String },

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("Probe path '{0}' must start with '/'")]
    InvalidProbePath(String),

    #[error("{field} cannot be empty")]
    EmptyTag { field: &'static str },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(listen) = &config.daemon.health_listen
        && let Err(e) = listen.parse::<SocketAddr>()
    {
        errors.push(ValidationError::InvalidListenAddress {
            value: listen.clone(),
            message: e.to_string(),
        });
    }

    if config.daemon.reap_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "daemon.reap_interval_seconds",
        });
    }

    errors.extend(validate_discovery(&config.discovery));
    errors.extend(validate_probe(&config.probe));

    errors
}

fn validate_discovery(discovery: &RawDiscoveryConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(regions) = &discovery.regions {
        if regions.is_empty() {
            errors.push(ValidationError::NoRegions);
        }

        let mut seen = HashSet::new();
        for region in regions {
            if region.trim().is_empty() {
                errors.push(ValidationError::EmptyRegion);
            } else if !seen.insert(region.as_str()) {
                errors.push(ValidationError::DuplicateRegion(region.clone()));
            }
        }
    }

    if discovery
        .role_tag_key
        .as_deref()
        .is_some_and(|k| k.trim().is_empty())
    {
        errors.push(ValidationError::EmptyTag {
            field: "discovery.role_tag_key",
        });
    }

    if discovery
        .role_tag_value
        .as_deref()
        .is_some_and(|v| v.trim().is_empty())
    {
        errors.push(ValidationError::EmptyTag {
            field: "discovery.role_tag_value",
        });
    }

    errors
}

fn validate_probe(probe: &RawProbeConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if probe.port == Some(0) {
        errors.push(ValidationError::ZeroValue { field: "probe.port" });
    }

    if probe.timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "probe.timeout_ms",
        });
    }

    if let Some(path) = &probe.path
        && !path.starts_with('/')
    {
        errors.push(ValidationError::InvalidProbePath(path.clone()));
    }

    errors
}
