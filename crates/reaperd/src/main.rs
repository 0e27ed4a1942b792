//! reaperd - The idle reaper service
//!
//! This is the main entry point for the reaper service.
//! It wires together all the components:
//! - Configuration loading
//! - EC2 provider and HTTP activity probe
//! - Fleet reaper, run on a fixed period
//! - Liveness endpoint

mod health;

use anyhow::{Context, Result};
use clap::Parser;
use reaper_cloud_aws::{Ec2Provider, HttpActivityProbe, HttpProbeConfig};
use reaper_config::{Policy, load_config};
use reaper_core::FleetReaper;
use reaper_util::default_config_path;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// reaperd - Terminates idle remote development instances
#[derive(Parser, Debug)]
#[command(name = "reaperd")]
#[command(about = "Terminates idle remote development instances", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/reaper/config.toml, built-in defaults if absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Liveness endpoint bind address override (or set REAPER_HEALTH_LISTEN env var)
    #[arg(long, env = "REAPER_HEALTH_LISTEN")]
    health_listen: Option<SocketAddr>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    policy: Policy,
    reaper: FleetReaper,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let mut policy = load_policy(args)?;
        if let Some(addr) = args.health_listen {
            policy.daemon.health_listen = addr;
        }

        info!(
            regions = ?policy.discovery.regions,
            interval_secs = policy.daemon.reap_interval.as_secs(),
            probe_port = policy.probe.port,
            "Configuration loaded"
        );

        let provider = Arc::new(Ec2Provider::from_env().await);

        let probe = Arc::new(
            HttpActivityProbe::new(HttpProbeConfig {
                port: policy.probe.port,
                path: policy.probe.path.clone(),
                timeout: policy.probe.timeout,
            })
            .context("Failed to create activity probe HTTP client")?,
        );

        let reaper = FleetReaper::new(&policy, provider, probe);

        Ok(Self { policy, reaper })
    }

    async fn run(mut self) -> Result<()> {
        let listen = self.policy.daemon.health_listen;
        let listener = TcpListener::bind(listen)
            .await
            .with_context(|| format!("Failed to bind liveness endpoint on {}", listen))?;

        info!(listen = %listen, "Liveness endpoint started");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let health_handle = tokio::spawn(async move {
            if let Err(e) = health::serve(listener, shutdown_rx).await {
                error!(error = %e, "Liveness endpoint error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;

        // First cycle fires one full period after startup
        let period = self.policy.daemon.reap_interval;
        let mut reap_timer = tokio::time::interval_at(Instant::now() + period, period);
        reap_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(period_secs = period.as_secs(), "Service running");

        loop {
            // Signals are only observed between cycles; a cycle in progress
            // always runs to completion.
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = reap_timer.tick() => {
                    self.reaper.run_cycle().await;
                }
            }
        }

        info!("Shutting down reaperd");

        let _ = shutdown_tx.send(true);
        if let Err(e) = health_handle.await {
            error!(error = %e, "Liveness endpoint task failed");
        }

        info!(
            instances_seen = self.reaper.seen().len(),
            "Shutdown complete"
        );
        Ok(())
    }
}

/// Explicit path if given, else the default path if it exists, else built-in defaults
fn load_policy(args: &Args) -> Result<Policy> {
    if let Some(path) = &args.config {
        return load_config(path)
            .with_context(|| format!("Failed to load config from {:?}", path));
    }

    let path = default_config_path();
    if path.exists() {
        let policy = load_config(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?;
        info!(config_path = %path.display(), "Using default config file");
        return Ok(policy);
    }

    info!(config_path = %path.display(), "No config file found, using built-in defaults");
    Ok(Policy::default())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "reaperd starting"
    );

    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "reaperd",
            "--config",
            "/etc/reaper/config.toml",
            "--health-listen",
            "127.0.0.1:9000",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("/etc/reaper/config.toml")));
        assert_eq!(args.health_listen, Some("127.0.0.1:9000".parse().unwrap()));
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn explicit_config_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "config_version = 1\n\n[daemon]\nreap_interval_seconds = 120").unwrap();

        let args = Args::try_parse_from([
            "reaperd",
            "--config",
            file.path().to_str().unwrap(),
        ])
        .unwrap();

        let policy = load_policy(&args).unwrap();
        assert_eq!(policy.daemon.reap_interval, Duration::from_secs(120));
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let args = Args::try_parse_from(["reaperd", "--config", path.to_str().unwrap()]).unwrap();
        assert!(load_policy(&args).is_err());
    }
}
