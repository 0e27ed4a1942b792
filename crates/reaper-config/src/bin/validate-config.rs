//! Config validation CLI tool
//!
//! Validates a reaper configuration file and reports any errors.

use reaper_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates an idle reaper configuration file.");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match reaper_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", reaper_config::CURRENT_CONFIG_VERSION);
            println!("  Health endpoint: {}", policy.daemon.health_listen);
            println!("  Reap interval: {}s", policy.daemon.reap_interval.as_secs());
            println!(
                "  Role tag: {}={}",
                policy.discovery.role_tag_key, policy.discovery.role_tag_value
            );
            println!(
                "  Probe: port {} path {} timeout {}ms",
                policy.probe.port,
                policy.probe.path,
                policy.probe.timeout.as_millis()
            );
            println!("  On termination failure: {:?}", policy.termination);
            println!();
            println!("Regions:");
            for region in &policy.discovery.regions {
                println!("  - {}", region);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                reaper_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                reaper_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                reaper_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                reaper_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        reaper_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
