//! Results of a reap cycle

use chrono::{DateTime, Local};
use reaper_cloud_api::ProviderError;
use reaper_util::{CycleId, InstanceId, Region};
use std::time::Duration;
use thiserror::Error;

/// Failure of a region's reap cycle
#[derive(Debug, Clone, Error)]
pub enum ReapError {
    #[error("Failed to initialize session for {region}: {source}")]
    Session {
        region: Region,
        source: ProviderError,
    },

    #[error("Couldn't retrieve running instances in {region}: {source}")]
    Discovery {
        region: Region,
        source: ProviderError,
    },

    #[error("Failed to terminate instance {instance_id} in {region}: {source}")]
    Termination {
        region: Region,
        instance_id: InstanceId,
        source: ProviderError,
    },
}

impl ReapError {
    pub fn region(&self) -> &Region {
        match self {
            Self::Session { region, .. }
            | Self::Discovery { region, .. }
            | Self::Termination { region, .. } => region,
        }
    }
}

/// How a region's cycle ended
#[derive(Debug, Clone)]
pub enum RegionOutcome {
    /// Every discovered instance was processed
    Completed,
    /// The region was abandoned for this cycle
    Failed(ReapError),
}

/// What happened in one region during one cycle
#[derive(Debug, Clone)]
pub struct RegionReport {
    pub region: Region,
    pub discovered: usize,
    /// Ids observed for the first time by this process
    pub newly_seen: Vec<InstanceId>,
    /// Instances left running (active, or activity unknown)
    pub preserved: Vec<InstanceId>,
    /// Instances a terminate call succeeded for
    pub terminated: Vec<InstanceId>,
    /// Instances a terminate call failed for
    pub failed_terminations: Vec<InstanceId>,
    pub outcome: RegionOutcome,
}

impl RegionReport {
    pub fn new(region: Region) -> Self {
        Self {
            region,
            discovered: 0,
            newly_seen: Vec::new(),
            preserved: Vec::new(),
            terminated: Vec::new(),
            failed_terminations: Vec::new(),
            outcome: RegionOutcome::Completed,
        }
    }

    pub fn error(&self) -> Option<&ReapError> {
        match &self.outcome {
            RegionOutcome::Completed => None,
            RegionOutcome::Failed(e) => Some(e),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error().is_some()
    }
}

/// Result of one pass over every configured region
#[derive(Debug, Clone)]
pub struct FleetReport {
    pub cycle_id: CycleId,
    pub started_at: DateTime<Local>,
    pub elapsed: Duration,
    /// In configured region order
    pub regions: Vec<RegionReport>,
}

impl FleetReport {
    /// Every successfully terminated instance, in processing order
    pub fn terminated(&self) -> Vec<InstanceId> {
        self.regions
            .iter()
            .flat_map(|r| r.terminated.iter().cloned())
            .collect()
    }

    pub fn failed_regions(&self) -> Vec<&Region> {
        self.regions
            .iter()
            .filter(|r| r.is_failed())
            .map(|r| &r.region)
            .collect()
    }

    pub fn region(&self, region: &Region) -> Option<&RegionReport> {
        self.regions.iter().find(|r| &r.region == region)
    }
}
