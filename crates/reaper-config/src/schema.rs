//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global daemon settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,

    /// Which instances to look for, and where
    #[serde(default)]
    pub discovery: RawDiscoveryConfig,

    /// Activity probe endpoint on each instance
    #[serde(default)]
    pub probe: RawProbeConfig,

    /// Termination behavior
    #[serde(default)]
    pub termination: RawTerminationConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// Liveness endpoint bind address (default: 0.0.0.0:8080)
    pub health_listen: Option<String>,

    /// Seconds between fleet reap cycles (default: 60)
    pub reap_interval_seconds: Option<u64>,
}

/// Discovery settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDiscoveryConfig {
    /// Regions to scan, in order
    pub regions: Option<Vec<String>>,

    /// Tag key marking reaper-eligible instances (default: Role)
    pub role_tag_key: Option<String>,

    /// Tag value marking reaper-eligible instances (default: remote_dev)
    pub role_tag_value: Option<String>,
}

/// Activity probe settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProbeConfig {
    /// Port of the activity server on each instance (default: 18800)
    pub port: Option<u16>,

    /// Request path (default: /sessions)
    pub path: Option<String>,

    /// Request timeout in milliseconds (default: 2000)
    pub timeout_ms: Option<u64>,
}

/// Termination settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTerminationConfig {
    pub on_failure: Option<RawTerminationFailure>,
}

/// What to do with the rest of a region after a failed termination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RawTerminationFailure {
    AbortRegion,
    ContinueRegion,
}
