//! Region and fleet reap cycles

use chrono::Local;
use reaper_cloud_api::{
    ActivityProbe, ActivitySample, CloudProvider, DiscoveryFilter, Instance, ProbeError,
    ProbeResult,
};
use reaper_config::{Policy, TerminationFailurePolicy};
use reaper_util::{CycleId, Region};
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{FleetReport, ReapError, RegionOutcome, RegionReport, SeenTracker};

/// Fail-safe applied to a probe result: any failure counts as active.
pub fn effective_activity(result: ProbeResult<ActivitySample>) -> ActivitySample {
    result.unwrap_or(ActivitySample::ASSUME_ACTIVE)
}

/// Runs reap cycles over a fixed, ordered list of regions.
///
/// Everything is sequential: one region at a time, one instance at a time.
/// The seen-instance tracker is owned here and only ever touched by the
/// task driving the cycles.
pub struct FleetReaper {
    regions: Vec<Region>,
    filter: DiscoveryFilter,
    on_termination_failure: TerminationFailurePolicy,
    provider: Arc<dyn CloudProvider>,
    probe: Arc<dyn ActivityProbe>,
    seen: SeenTracker,
}

impl FleetReaper {
    pub fn new(
        policy: &Policy,
        provider: Arc<dyn CloudProvider>,
        probe: Arc<dyn ActivityProbe>,
    ) -> Self {
        info!(
            regions = policy.discovery.regions.len(),
            tag_key = %policy.discovery.role_tag_key,
            tag_value = %policy.discovery.role_tag_value,
            on_termination_failure = ?policy.termination,
            "Fleet reaper initialized"
        );

        Self {
            regions: policy.discovery.regions.clone(),
            filter: DiscoveryFilter::new(
                policy.discovery.role_tag_key.clone(),
                policy.discovery.role_tag_value.clone(),
            ),
            on_termination_failure: policy.termination,
            provider,
            probe,
            seen: SeenTracker::new(),
        }
    }

    /// Replace the seen-instance tracker
    pub fn with_tracker(mut self, seen: SeenTracker) -> Self {
        self.seen = seen;
        self
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn seen(&self) -> &SeenTracker {
        &self.seen
    }

    /// Run one fleet cycle. A failed region is logged and the next region
    /// is still attempted; this never fails as a whole.
    pub async fn run_cycle(&mut self) -> FleetReport {
        let cycle_id = CycleId::new();
        let span = info_span!("fleet_cycle", cycle_id = %cycle_id);

        async {
            let started_at = Local::now();
            let start = Instant::now();
            let mut reports = Vec::with_capacity(self.regions.len());

            for region in self.regions.clone() {
                let report = self.reap_region(&region).await;
                if let Some(e) = report.error() {
                    error!(region = %region, error = %e, "Unable to reap instances in region");
                }
                reports.push(report);
            }

            let report = FleetReport {
                cycle_id,
                started_at,
                elapsed: start.elapsed(),
                regions: reports,
            };

            info!(
                regions = report.regions.len(),
                failed_regions = report.failed_regions().len(),
                terminated = report.terminated().len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Fleet cycle complete"
            );

            report
        }
        .instrument(span)
        .await
    }

    /// Run the reap cycle for a single region
    pub async fn reap_region(&mut self, region: &Region) -> RegionReport {
        let mut report = RegionReport::new(region.clone());

        if let Err(e) = self.reap_region_inner(region, &mut report).await {
            report.outcome = RegionOutcome::Failed(e);
        }

        report
    }

    async fn reap_region_inner(
        &mut self,
        region: &Region,
        report: &mut RegionReport,
    ) -> Result<(), ReapError> {
        let client = self
            .provider
            .region_client(region)
            .await
            .map_err(|source| ReapError::Session {
                region: region.clone(),
                source,
            })?;

        let instances = client
            .discover(&self.filter)
            .await
            .map_err(|source| ReapError::Discovery {
                region: region.clone(),
                source,
            })?;

        report.discovered = instances.len();
        debug!(region = %region, count = instances.len(), "Checking instances");

        for instance in instances {
            if self.seen.observe(&instance.id) {
                info!(
                    region = %region,
                    instance_id = %instance.id,
                    address = ?instance.public_address,
                    "New instance detected"
                );
                report.newly_seen.push(instance.id.clone());
            }

            let activity = self.sample_activity(region, &instance).await;
            if !activity.is_idle() {
                report.preserved.push(instance.id);
                continue;
            }

            info!(
                region = %region,
                instance_id = %instance.id,
                "Terminating instance with 0 sessions for the last 2 hours"
            );

            match client.terminate(&instance.id).await {
                Ok(()) => report.terminated.push(instance.id),
                Err(source) => {
                    report.failed_terminations.push(instance.id.clone());
                    let e = ReapError::Termination {
                        region: region.clone(),
                        instance_id: instance.id,
                        source,
                    };

                    match self.on_termination_failure {
                        TerminationFailurePolicy::AbortRegion => return Err(e),
                        TerminationFailurePolicy::ContinueRegion => {
                            warn!(error = %e, "Termination failed, continuing with region");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Probe one instance, applying the fail-safe on any failure
    async fn sample_activity(&self, region: &Region, instance: &Instance) -> ActivitySample {
        let result = match instance.public_address {
            Some(address) => self.probe.probe(address).await,
            None => Err(ProbeError::NoAddress),
        };

        if let Err(e) = &result {
            warn!(
                region = %region,
                instance_id = %instance.id,
                address = ?instance.public_address,
                error = %e,
                "Activity probe failed, treating instance as active"
            );
        }

        let activity = effective_activity(result);
        debug!(
            region = %region,
            instance_id = %instance.id,
            sessions = activity.active_sessions_2hr,
            "Activity sampled"
        );
        activity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reaper_cloud_api::{MockProbe, MockProvider};
    use reaper_config::DiscoveryPolicy;
    use reaper_util::InstanceId;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn policy(regions: &[&str], on_failure: TerminationFailurePolicy) -> Policy {
        Policy {
            discovery: DiscoveryPolicy {
                regions: regions.iter().map(|r| Region::from(*r)).collect(),
                ..Default::default()
            },
            termination: on_failure,
            ..Default::default()
        }
    }

    fn reaper(policy: &Policy, provider: &MockProvider, probe: &MockProbe) -> FleetReaper {
        FleetReaper::new(policy, Arc::new(provider.clone()), Arc::new(probe.clone()))
    }

    fn ids(list: &[&str]) -> Vec<InstanceId> {
        list.iter().map(|i| InstanceId::from(*i)).collect()
    }

    #[test]
    fn every_probe_failure_counts_as_active() {
        let failures = [
            ProbeError::NoAddress,
            ProbeError::Timeout,
            ProbeError::Unreachable("connection refused".into()),
            ProbeError::Body("reset".into()),
            ProbeError::Malformed {
                status: 500,
                message: "expected value".into(),
            },
        ];

        for failure in failures {
            let activity = effective_activity(Err(failure));
            assert_eq!(activity.active_sessions_2hr, 1);
            assert!(!activity.is_idle());
        }

        assert!(effective_activity(Ok(ActivitySample::new(0))).is_idle());
    }

    #[tokio::test]
    async fn idle_instance_terminated_active_preserved() {
        let provider = MockProvider::new();
        provider.set_instances(
            "us-east-1",
            vec![
                Instance::new("i-1", Some(addr(1))),
                Instance::new("i-2", Some(addr(2))),
            ],
        );
        let probe = MockProbe::new();
        probe.set_sessions(addr(1), 0);
        probe.set_sessions(addr(2), 3);

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let report = reaper(&policy, &provider, &probe)
            .reap_region(&Region::from("us-east-1"))
            .await;

        assert!(!report.is_failed());
        assert_eq!(report.discovered, 2);
        assert_eq!(report.terminated, ids(&["i-1"]));
        assert_eq!(report.preserved, ids(&["i-2"]));
        assert_eq!(
            provider.terminate_attempts(),
            vec![(Region::from("us-east-1"), InstanceId::from("i-1"))]
        );
    }

    #[tokio::test]
    async fn discovery_uses_configured_tag() {
        let provider = MockProvider::new();
        let probe = MockProbe::new();
        let mut policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        policy.discovery.role_tag_value = "scratch".into();

        reaper(&policy, &provider, &probe).run_cycle().await;

        assert_eq!(
            provider.last_filter(),
            Some(DiscoveryFilter::new("Role", "scratch"))
        );
    }

    #[tokio::test]
    async fn probe_timeout_preserves_instance() {
        let provider = MockProvider::new();
        provider.set_instances("us-east-1", vec![Instance::new("i-1", Some(addr(1)))]);
        let probe = MockProbe::new();
        probe.set_failure(addr(1), ProbeError::Timeout);

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let report = reaper(&policy, &provider, &probe)
            .reap_region(&Region::from("us-east-1"))
            .await;

        assert_eq!(report.preserved, ids(&["i-1"]));
        assert!(provider.terminate_attempts().is_empty());
    }

    #[tokio::test]
    async fn instance_without_address_is_not_probed_or_terminated() {
        let provider = MockProvider::new();
        provider.set_instances("us-east-1", vec![Instance::new("i-1", None)]);
        let probe = MockProbe::new();

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let report = reaper(&policy, &provider, &probe)
            .reap_region(&Region::from("us-east-1"))
            .await;

        assert!(probe.calls().is_empty());
        assert_eq!(report.preserved, ids(&["i-1"]));
        assert!(provider.terminate_attempts().is_empty());
    }

    #[tokio::test]
    async fn termination_failure_aborts_region_by_default() {
        let provider = MockProvider::new();
        provider.set_instances(
            "us-east-1",
            vec![
                Instance::new("i-1", Some(addr(1))),
                Instance::new("i-2", Some(addr(2))),
            ],
        );
        provider.fail_terminate("i-1");
        let probe = MockProbe::new();
        probe.set_sessions(addr(1), 0);
        probe.set_sessions(addr(2), 0);

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let report = reaper(&policy, &provider, &probe)
            .reap_region(&Region::from("us-east-1"))
            .await;

        assert!(matches!(
            report.error(),
            Some(ReapError::Termination { instance_id, .. }) if instance_id.as_str() == "i-1"
        ));
        assert_eq!(report.failed_terminations, ids(&["i-1"]));
        assert_eq!(
            provider.terminate_attempts(),
            vec![(Region::from("us-east-1"), InstanceId::from("i-1"))]
        );
        // i-2 is never even probed once the region is abandoned
        assert_eq!(probe.calls(), vec![addr(1)]);
    }

    #[tokio::test]
    async fn termination_failure_can_continue_region() {
        let provider = MockProvider::new();
        provider.set_instances(
            "us-east-1",
            vec![
                Instance::new("i-1", Some(addr(1))),
                Instance::new("i-2", Some(addr(2))),
            ],
        );
        provider.fail_terminate("i-1");
        let probe = MockProbe::new();
        probe.set_sessions(addr(1), 0);
        probe.set_sessions(addr(2), 0);

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::ContinueRegion);
        let report = reaper(&policy, &provider, &probe)
            .reap_region(&Region::from("us-east-1"))
            .await;

        assert!(!report.is_failed());
        assert_eq!(report.failed_terminations, ids(&["i-1"]));
        assert_eq!(report.terminated, ids(&["i-2"]));
        assert_eq!(provider.terminate_attempts().len(), 2);
    }

    #[tokio::test]
    async fn session_failure_skips_region() {
        let provider = MockProvider::new();
        provider.fail_session("us-west-1");
        provider.set_instances("us-east-1", vec![Instance::new("i-1", Some(addr(1)))]);
        let probe = MockProbe::new();
        probe.set_sessions(addr(1), 0);

        let policy = policy(
            &["us-west-1", "us-east-1"],
            TerminationFailurePolicy::AbortRegion,
        );
        let report = reaper(&policy, &provider, &probe).run_cycle().await;

        assert_eq!(report.failed_regions(), vec![&Region::from("us-west-1")]);
        assert!(matches!(
            report.regions[0].error(),
            Some(ReapError::Session { .. })
        ));
        assert_eq!(report.terminated(), ids(&["i-1"]));
        // No discovery is attempted without a session
        assert_eq!(provider.discover_calls(), vec![Region::from("us-east-1")]);
    }

    #[tokio::test]
    async fn regions_processed_in_configured_order() {
        let provider = MockProvider::new();
        let probe = MockProbe::new();
        let policy = policy(
            &["ap-southeast-1", "us-east-1", "ap-south-1"],
            TerminationFailurePolicy::AbortRegion,
        );

        let report = reaper(&policy, &provider, &probe).run_cycle().await;

        let expected: Vec<Region> = ["ap-southeast-1", "us-east-1", "ap-south-1"]
            .into_iter()
            .map(Region::from)
            .collect();
        assert_eq!(provider.discover_calls(), expected);
        assert_eq!(
            report.regions.iter().map(|r| r.region.clone()).collect::<Vec<_>>(),
            expected
        );
    }

    #[tokio::test]
    async fn new_instances_reported_once() {
        let provider = MockProvider::new();
        provider.set_instances("us-east-1", vec![Instance::new("i-3", Some(addr(3)))]);
        let probe = MockProbe::new();
        probe.set_sessions(addr(3), 2);

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let mut reaper = reaper(&policy, &provider, &probe);

        let first = reaper.run_cycle().await;
        let second = reaper.run_cycle().await;

        assert_eq!(first.regions[0].newly_seen, ids(&["i-3"]));
        assert!(second.regions[0].newly_seen.is_empty());
        assert!(reaper.seen().contains(&InstanceId::from("i-3")));
    }

    #[tokio::test]
    async fn injected_tracker_suppresses_new_instance_report() {
        let provider = MockProvider::new();
        provider.set_instances("us-east-1", vec![Instance::new("i-3", Some(addr(3)))]);
        let probe = MockProbe::new();
        probe.set_sessions(addr(3), 0);

        let mut seen = SeenTracker::new();
        seen.observe(&InstanceId::from("i-3"));

        let policy = policy(&["us-east-1"], TerminationFailurePolicy::AbortRegion);
        let report = reaper(&policy, &provider, &probe)
            .with_tracker(seen)
            .run_cycle()
            .await;

        assert!(report.regions[0].newly_seen.is_empty());
        // Already seen does not protect the instance
        assert_eq!(report.terminated(), ids(&["i-3"]));
    }
}
