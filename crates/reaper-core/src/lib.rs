//! Reap cycle for the idle reaper
//!
//! This crate is the heart of the reaper, containing:
//! - The seen-instance tracker (first-observation logging only)
//! - The region reap cycle (discover -> probe -> decide -> terminate)
//! - The fleet reap cycle over all configured regions
//! - Per-cycle reports
//!
//! Failure handling is two-tiered: an error aborts at most its own region,
//! never the fleet cycle, and probe failures never cause a termination.

mod reaper;
mod report;
mod tracker;

pub use reaper::*;
pub use report::*;
pub use tracker::*;
