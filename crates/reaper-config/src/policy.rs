//! Validated policy structures

use crate::schema::{
    RawConfig, RawDaemonConfig, RawDiscoveryConfig, RawProbeConfig, RawTerminationFailure,
};
use reaper_util::Region;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Regions scanned when the config does not list any
pub const DEFAULT_REGIONS: &[&str] = &["us-east-1", "us-west-1", "ap-south-1", "ap-southeast-1"];

pub const DEFAULT_HEALTH_PORT: u16 = 8080;
pub const DEFAULT_REAP_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_ROLE_TAG_KEY: &str = "Role";
pub const DEFAULT_ROLE_TAG_VALUE: &str = "remote_dev";
pub const DEFAULT_PROBE_PORT: u16 = 18800;
pub const DEFAULT_PROBE_PATH: &str = "/sessions";
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Validated policy ready for use by the reaper
#[derive(Debug, Clone, Default)]
pub struct Policy {
    pub daemon: DaemonConfig,
    pub discovery: DiscoveryPolicy,
    pub probe: ProbePolicy,
    pub termination: TerminationFailurePolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            daemon: DaemonConfig::from_raw(raw.daemon),
            discovery: DiscoveryPolicy::from_raw(raw.discovery),
            probe: ProbePolicy::from_raw(raw.probe),
            termination: raw
                .termination
                .on_failure
                .map(TerminationFailurePolicy::from)
                .unwrap_or_default(),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub health_listen: SocketAddr,
    pub reap_interval: Duration,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        let defaults = Self::default();
        Self {
            health_listen: raw
                .health_listen
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.health_listen),
            reap_interval: raw
                .reap_interval_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.reap_interval),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            health_listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_HEALTH_PORT)),
            reap_interval: DEFAULT_REAP_INTERVAL,
        }
    }
}

/// Which instances are reaper-eligible, and where to look for them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    /// Scanned in this order every cycle
    pub regions: Vec<Region>,
    pub role_tag_key: String,
    pub role_tag_value: String,
}

impl DiscoveryPolicy {
    fn from_raw(raw: RawDiscoveryConfig) -> Self {
        let defaults = Self::default();
        Self {
            regions: raw
                .regions
                .map(|r| r.into_iter().map(Region::from).collect())
                .unwrap_or(defaults.regions),
            role_tag_key: raw.role_tag_key.unwrap_or(defaults.role_tag_key),
            role_tag_value: raw.role_tag_value.unwrap_or(defaults.role_tag_value),
        }
    }
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            regions: DEFAULT_REGIONS.iter().map(|r| Region::from(*r)).collect(),
            role_tag_key: DEFAULT_ROLE_TAG_KEY.into(),
            role_tag_value: DEFAULT_ROLE_TAG_VALUE.into(),
        }
    }
}

/// Where and how each instance's activity server is queried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub port: u16,
    pub path: String,
    pub timeout: Duration,
}

impl ProbePolicy {
    fn from_raw(raw: RawProbeConfig) -> Self {
        let defaults = Self::default();
        Self {
            port: raw.port.unwrap_or(defaults.port),
            path: raw.path.unwrap_or(defaults.path),
            timeout: raw
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.timeout),
        }
    }
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            port: DEFAULT_PROBE_PORT,
            path: DEFAULT_PROBE_PATH.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// What happens to the rest of a region's instances when a termination call fails.
///
/// Discovery and session failures always skip only their own region; this
/// setting only governs failures of the terminate call itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TerminationFailurePolicy {
    /// Stop processing the region for this cycle
    #[default]
    AbortRegion,
    /// Log the failure and move on to the next instance
    ContinueRegion,
}

impl From<RawTerminationFailure> for TerminationFailurePolicy {
    fn from(raw: RawTerminationFailure) -> Self {
        match raw {
            RawTerminationFailure::AbortRegion => Self::AbortRegion,
            RawTerminationFailure::ContinueRegion => Self::ContinueRegion,
        }
    }
}
