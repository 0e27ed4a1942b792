//! Shared utilities for the idle reaper
//!
//! This crate provides:
//! - ID types (InstanceId, Region, CycleId)
//! - Default paths for the configuration file

mod ids;
mod paths;

pub use ids::*;
pub use paths::*;
