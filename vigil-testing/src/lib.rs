//! Testing utilities for the Vigil lifecycle coordination framework.
//!
//! Provides status-tracking managed-unit doubles and unreachable-backend
//! cluster services used by the workspace's integration tests.

pub mod cluster;
pub mod units;

pub use cluster::UnavailableClusterService;
pub use units::RecordingUnit;
