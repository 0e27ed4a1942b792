//! AWS adapter for the idle reaper
//!
//! Provides:
//! - EC2 discovery of running, role-tagged instances per region
//! - EC2 termination by instance id
//! - HTTP client for the activity server on each instance

mod ec2;
mod probe;

pub use ec2::*;
pub use probe::*;
