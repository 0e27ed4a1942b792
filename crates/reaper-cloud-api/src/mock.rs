//! Mock provider and probe for testing

use async_trait::async_trait;
use reaper_util::{InstanceId, Region};
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};

use crate::{
    ActivityProbe, ActivitySample, CloudProvider, DiscoveryFilter, Instance, ProbeError,
    ProbeResult, ProviderError, ProviderResult, RegionClient,
};

#[derive(Debug, Default)]
struct MockProviderState {
    instances: HashMap<Region, Vec<Instance>>,
    fail_session: HashSet<Region>,
    fail_discovery: HashSet<Region>,
    fail_terminate: HashSet<InstanceId>,
    discover_calls: Vec<Region>,
    terminate_attempts: Vec<(Region, InstanceId)>,
    terminated: Vec<(Region, InstanceId)>,
    last_filter: Option<DiscoveryFilter>,
}

/// In-memory cloud provider for unit/integration testing.
///
/// Terminated instances are recorded but stay discoverable, which models a
/// provider that has not converged yet between two cycles.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<MockProviderState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instances discovery returns for a region
    pub fn set_instances(&self, region: impl Into<Region>, instances: Vec<Instance>) {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(region.into(), instances);
    }

    /// Make building a client for the region fail
    pub fn fail_session(&self, region: impl Into<Region>) {
        self.state.lock().unwrap().fail_session.insert(region.into());
    }

    /// Make discovery in the region fail
    pub fn fail_discovery(&self, region: impl Into<Region>) {
        self.state
            .lock()
            .unwrap()
            .fail_discovery
            .insert(region.into());
    }

    /// Make terminating the instance fail
    pub fn fail_terminate(&self, instance_id: impl Into<InstanceId>) {
        self.state
            .lock()
            .unwrap()
            .fail_terminate
            .insert(instance_id.into());
    }

    /// Regions discovery was called for, in call order
    pub fn discover_calls(&self) -> Vec<Region> {
        self.state.lock().unwrap().discover_calls.clone()
    }

    /// Every terminate call, successful or not, in call order
    pub fn terminate_attempts(&self) -> Vec<(Region, InstanceId)> {
        self.state.lock().unwrap().terminate_attempts.clone()
    }

    /// Successful terminate calls, in call order
    pub fn terminated(&self) -> Vec<(Region, InstanceId)> {
        self.state.lock().unwrap().terminated.clone()
    }

    pub fn last_filter(&self) -> Option<DiscoveryFilter> {
        self.state.lock().unwrap().last_filter.clone()
    }
}

#[async_trait]
impl CloudProvider for MockProvider {
    async fn region_client(&self, region: &Region) -> ProviderResult<Box<dyn RegionClient>> {
        if self.state.lock().unwrap().fail_session.contains(region) {
            return Err(ProviderError::Session(format!(
                "Mock session failure for {}",
                region
            )));
        }

        Ok(Box::new(MockRegionClient {
            region: region.clone(),
            state: self.state.clone(),
        }))
    }
}

struct MockRegionClient {
    region: Region,
    state: Arc<Mutex<MockProviderState>>,
}

#[async_trait]
impl RegionClient for MockRegionClient {
    fn region(&self) -> &Region {
        &self.region
    }

    async fn discover(&self, filter: &DiscoveryFilter) -> ProviderResult<Vec<Instance>> {
        let mut state = self.state.lock().unwrap();
        state.discover_calls.push(self.region.clone());
        state.last_filter = Some(filter.clone());

        if state.fail_discovery.contains(&self.region) {
            return Err(ProviderError::Discovery(format!(
                "Mock discovery failure for {}",
                self.region
            )));
        }

        Ok(state
            .instances
            .get(&self.region)
            .cloned()
            .unwrap_or_default())
    }

    async fn terminate(&self, instance_id: &InstanceId) -> ProviderResult<()> {
        let mut state = self.state.lock().unwrap();
        state
            .terminate_attempts
            .push((self.region.clone(), instance_id.clone()));

        if state.fail_terminate.contains(instance_id) {
            return Err(ProviderError::Termination {
                instance_id: instance_id.clone(),
                message: "Mock termination failure".into(),
            });
        }

        state
            .terminated
            .push((self.region.clone(), instance_id.clone()));
        Ok(())
    }
}

/// Canned probe behavior for one address
#[derive(Debug, Clone)]
pub enum MockActivity {
    Sessions(u64),
    Fail(ProbeError),
}

/// In-memory activity probe. Addresses without a configured response are
/// reported as unreachable.
#[derive(Clone, Default)]
pub struct MockProbe {
    responses: Arc<Mutex<HashMap<IpAddr, MockActivity>>>,
    calls: Arc<Mutex<Vec<IpAddr>>>,
}

impl MockProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sessions(&self, address: IpAddr, sessions: u64) {
        self.responses
            .lock()
            .unwrap()
            .insert(address, MockActivity::Sessions(sessions));
    }

    pub fn set_failure(&self, address: IpAddr, error: ProbeError) {
        self.responses
            .lock()
            .unwrap()
            .insert(address, MockActivity::Fail(error));
    }

    /// Addresses probed, in call order
    pub fn calls(&self) -> Vec<IpAddr> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActivityProbe for MockProbe {
    async fn probe(&self, address: IpAddr) -> ProbeResult<ActivitySample> {
        self.calls.lock().unwrap().push(address);

        match self.responses.lock().unwrap().get(&address) {
            Some(MockActivity::Sessions(n)) => Ok(ActivitySample::new(*n)),
            Some(MockActivity::Fail(e)) => Err(e.clone()),
            None => Err(ProbeError::Unreachable(format!(
                "No mock response for {}",
                address
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[tokio::test]
    async fn mock_discover_and_terminate() {
        let provider = MockProvider::new();
        provider.set_instances("us-east-1", vec![Instance::new("i-1", Some(addr(1)))]);

        let client = provider
            .region_client(&Region::from("us-east-1"))
            .await
            .unwrap();
        let filter = DiscoveryFilter::new("Role", "remote_dev");

        let instances = client.discover(&filter).await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(provider.last_filter(), Some(filter));

        client.terminate(&InstanceId::from("i-1")).await.unwrap();
        assert_eq!(provider.terminated().len(), 1);
    }

    #[tokio::test]
    async fn mock_failures() {
        let provider = MockProvider::new();
        provider.fail_session("ap-south-1");
        provider.fail_discovery("us-west-1");
        provider.fail_terminate("i-2");

        assert!(matches!(
            provider.region_client(&Region::from("ap-south-1")).await,
            Err(ProviderError::Session(_))
        ));

        let client = provider
            .region_client(&Region::from("us-west-1"))
            .await
            .unwrap();
        let filter = DiscoveryFilter::new("Role", "remote_dev");
        assert!(matches!(
            client.discover(&filter).await,
            Err(ProviderError::Discovery(_))
        ));

        assert!(client.terminate(&InstanceId::from("i-2")).await.is_err());
        assert_eq!(provider.terminate_attempts().len(), 1);
        assert!(provider.terminated().is_empty());
    }

    #[tokio::test]
    async fn mock_probe_defaults_to_unreachable() {
        let probe = MockProbe::new();
        probe.set_sessions(addr(1), 2);

        assert_eq!(probe.probe(addr(1)).await.unwrap().active_sessions_2hr, 2);
        assert!(matches!(
            probe.probe(addr(2)).await,
            Err(ProbeError::Unreachable(_))
        ));
        assert_eq!(probe.calls(), vec![addr(1), addr(2)]);
    }
}
