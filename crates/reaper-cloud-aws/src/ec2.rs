//! EC2 provider implementation

use async_trait::async_trait;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::{Filter, Instance as Ec2Instance};
use aws_sdk_ec2::Client;
use reaper_cloud_api::{
    CloudProvider, DiscoveryFilter, Instance, ProviderError, ProviderResult, RegionClient,
};
use reaper_util::{InstanceId, Region};
use std::net::IpAddr;
use tracing::{debug, warn};

/// EC2 state filter value for instances that can be reaped
const RUNNING_STATE: &str = "running";

/// Cloud provider backed by the AWS SDK.
///
/// Credentials and shared settings are resolved once from the environment;
/// each region gets its own EC2 client built from them.
pub struct Ec2Provider {
    shared: SdkConfig,
}

impl Ec2Provider {
    /// Load credentials and settings from the standard AWS sources
    /// (environment, profile, instance metadata)
    pub async fn from_env() -> Self {
        let shared = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self { shared }
    }

    pub fn from_config(shared: SdkConfig) -> Self {
        Self { shared }
    }
}

#[async_trait]
impl CloudProvider for Ec2Provider {
    async fn region_client(&self, region: &Region) -> ProviderResult<Box<dyn RegionClient>> {
        if region.as_str().is_empty() {
            return Err(ProviderError::Session("empty region name".into()));
        }
        if self.shared.credentials_provider().is_none() {
            return Err(ProviderError::Session(format!(
                "no AWS credentials provider configured for {}",
                region
            )));
        }

        let config = aws_sdk_ec2::config::Builder::from(&self.shared)
            .region(aws_sdk_ec2::config::Region::new(region.as_str().to_owned()))
            .build();

        Ok(Box::new(Ec2RegionClient {
            region: region.clone(),
            client: Client::from_conf(config),
        }))
    }
}

/// EC2 client bound to one region
pub struct Ec2RegionClient {
    region: Region,
    client: Client,
}

#[async_trait]
impl RegionClient for Ec2RegionClient {
    fn region(&self) -> &Region {
        &self.region
    }

    async fn discover(&self, filter: &DiscoveryFilter) -> ProviderResult<Vec<Instance>> {
        let filters = vec![
            Filter::builder()
                .name("instance-state-name")
                .values(RUNNING_STATE)
                .build(),
            Filter::builder()
                .name(format!("tag:{}", filter.tag_key))
                .values(&filter.tag_value)
                .build(),
        ];

        let mut pages = self
            .client
            .describe_instances()
            .set_filters(Some(filters))
            .into_paginator()
            .send();

        let mut instances = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page
                .map_err(|e| ProviderError::Discovery(DisplayErrorContext(&e).to_string()))?;

            for reservation in page.reservations() {
                instances.extend(
                    reservation
                        .instances()
                        .iter()
                        .filter_map(|i| instance_from_ec2(&self.region, i)),
                );
            }
        }

        debug!(region = %self.region, count = instances.len(), "Discovered instances");
        Ok(instances)
    }

    async fn terminate(&self, instance_id: &InstanceId) -> ProviderResult<()> {
        self.client
            .terminate_instances()
            .instance_ids(instance_id.as_str())
            .send()
            .await
            .map_err(|e| ProviderError::Termination {
                instance_id: instance_id.clone(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

/// Convert an SDK instance description. Instances without an id are
/// dropped; an unparsable public address is treated as absent.
fn instance_from_ec2(region: &Region, instance: &Ec2Instance) -> Option<Instance> {
    let Some(id) = instance.instance_id() else {
        warn!(region = %region, "Skipping instance without an id");
        return None;
    };

    let public_address = instance
        .public_ip_address()
        .and_then(|ip| match ip.parse::<IpAddr>() {
            Ok(addr) => Some(addr),
            Err(e) => {
                warn!(region = %region, instance_id = id, address = ip, error = %e, "Unparsable public address");
                None
            }
        });

    Some(Instance::new(id, public_address))
}
