//! HTTP client for the activity server running on each instance

use async_trait::async_trait;
use reaper_cloud_api::{ActivityProbe, ActivitySample, ProbeError, ProbeResult, SessionReport};
use reqwest::Client;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::debug;

/// Where the activity server listens on each instance
#[derive(Debug, Clone)]
pub struct HttpProbeConfig {
    pub port: u16,
    pub path: String,
    /// Bounds the whole request, connect included
    pub timeout: Duration,
}

/// Probes `GET http://<address>:<port><path>` and parses
/// `{"total_active_sessions_2hr": <n>}` from the body.
///
/// The status code is not checked: any body that parses is accepted.
pub struct HttpActivityProbe {
    client: Client,
    config: HttpProbeConfig,
}

impl HttpActivityProbe {
    pub fn new(config: HttpProbeConfig) -> reqwest::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()?;

        Ok(Self { client, config })
    }

    /// Full URL of the activity endpoint on the given instance
    pub fn sessions_url(&self, address: IpAddr) -> String {
        format!(
            "http://{}{}",
            SocketAddr::new(address, self.config.port),
            self.config.path
        )
    }
}

#[async_trait]
impl ActivityProbe for HttpActivityProbe {
    async fn probe(&self, address: IpAddr) -> ProbeResult<ActivitySample> {
        let url = self.sessions_url(address);
        debug!(url = %url, "Probing activity server");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Unreachable(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Body(e.to_string())
            }
        })?;

        let report: SessionReport =
            serde_json::from_slice(&body).map_err(|e| ProbeError::Malformed {
                status: status.as_u16(),
                message: e.to_string(),
            })?;

        debug!(url = %url, sessions = report.total_active_sessions_2hr, "Activity reported");
        Ok(report.into())
    }
}
