//! Cloud provider trait interfaces for the idle reaper
//!
//! This crate defines the seam between the reap logic and the outside world:
//! instance discovery and termination per region, and the per-instance
//! activity probe. It contains no provider code itself; `MockProvider` and
//! `MockProbe` are in-memory implementations for tests.

mod mock;
mod model;
mod traits;

pub use mock::*;
pub use model::*;
pub use traits::*;
