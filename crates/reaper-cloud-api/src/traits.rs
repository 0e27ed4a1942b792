//! Provider and probe traits

use async_trait::async_trait;
use reaper_util::{InstanceId, Region};
use std::net::IpAddr;
use thiserror::Error;

use crate::{ActivitySample, DiscoveryFilter, Instance};

/// Errors from cloud provider operations
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Could not build a client/session for the region
    #[error("Session setup failed: {0}")]
    Session(String),

    #[error("Instance discovery failed: {0}")]
    Discovery(String),

    #[error("Termination of {instance_id} failed: {message}")]
    Termination {
        instance_id: InstanceId,
        message: String,
    },
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Errors from querying an instance's activity endpoint
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("Instance has no public address")]
    NoAddress,

    #[error("Request timed out")]
    Timeout,

    #[error("Activity server unreachable: {0}")]
    Unreachable(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Malformed response (HTTP {status}): {message}")]
    Malformed { status: u16, message: String },
}

pub type ProbeResult<T> = Result<T, ProbeError>;

/// Entry point to a cloud provider account
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Build a client bound to one region
    async fn region_client(&self, region: &Region) -> ProviderResult<Box<dyn RegionClient>>;
}

/// Provider operations scoped to a single region
#[async_trait]
pub trait RegionClient: Send + Sync {
    fn region(&self) -> &Region;

    /// List running instances carrying the filter's tag, in provider order.
    /// Either every instance is returned or an error; never a partial list.
    async fn discover(&self, filter: &DiscoveryFilter) -> ProviderResult<Vec<Instance>>;

    /// Request termination of exactly one instance. Does not wait for the
    /// instance to reach the terminated state.
    async fn terminate(&self, instance_id: &InstanceId) -> ProviderResult<()>;
}

/// Queries the activity server running on an instance
#[async_trait]
pub trait ActivityProbe: Send + Sync {
    async fn probe(&self, address: IpAddr) -> ProbeResult<ActivitySample>;
}
