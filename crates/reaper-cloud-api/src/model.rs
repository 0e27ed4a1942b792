//! Data model shared by providers, probes and the reaper core

use reaper_util::InstanceId;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A running, reaper-eligible instance as returned by discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: InstanceId,
    /// None when the provider reports no (or an unusable) public address
    pub public_address: Option<IpAddr>,
}

impl Instance {
    pub fn new(id: impl Into<InstanceId>, public_address: Option<IpAddr>) -> Self {
        Self {
            id: id.into(),
            public_address,
        }
    }
}

/// Tag filter applied by discovery, in addition to the running-state filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryFilter {
    pub tag_key: String,
    pub tag_value: String,
}

impl DiscoveryFilter {
    pub fn new(tag_key: impl Into<String>, tag_value: impl Into<String>) -> Self {
        Self {
            tag_key: tag_key.into(),
            tag_value: tag_value.into(),
        }
    }
}

/// Number of sessions an instance served in the trailing two hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySample {
    pub active_sessions_2hr: u64,
}

impl ActivitySample {
    /// Used whenever the real count cannot be determined: unreachable
    /// instances count as busy, never idle.
    pub const ASSUME_ACTIVE: Self = Self {
        active_sessions_2hr: 1,
    };

    pub fn new(active_sessions_2hr: u64) -> Self {
        Self {
            active_sessions_2hr,
        }
    }

    /// Exactly zero sessions is the only idle state
    pub fn is_idle(&self) -> bool {
        self.active_sessions_2hr == 0
    }
}

/// Body served by the activity endpoint on each instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    pub total_active_sessions_2hr: u64,
}

impl From<SessionReport> for ActivitySample {
    fn from(report: SessionReport) -> Self {
        Self::new(report.total_active_sessions_2hr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_is_idle() {
        assert!(ActivitySample::new(0).is_idle());
        assert!(!ActivitySample::new(3).is_idle());
        assert!(!ActivitySample::ASSUME_ACTIVE.is_idle());
    }

    #[test]
    fn session_report_wire_format() {
        let report: SessionReport =
            serde_json::from_str(r#"{"total_active_sessions_2hr": 4}"#).unwrap();
        assert_eq!(ActivitySample::from(report).active_sessions_2hr, 4);
    }

    #[test]
    fn session_report_rejects_missing_or_negative_count() {
        assert!(serde_json::from_str::<SessionReport>("{}").is_err());
        assert!(
            serde_json::from_str::<SessionReport>(r#"{"total_active_sessions_2hr": -1}"#).is_err()
        );
    }
}
