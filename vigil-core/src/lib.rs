//! # Vigil Core - Cluster Lifecycle Coordination
//!
//! Core abstractions for coordinating the running state of managed work
//! units with cluster leadership.
//!
//! This crate provides the building blocks the Vigil framework is made of:
//!
//! - **ClusterMember**: point-in-time observation of a node's identity,
//!   locality, and leadership
//! - **ClusterView trait**: namespace-scoped leadership state holder that
//!   broadcasts leadership changes to registered listeners
//! - **ClusterService trait**: lazily creates and memoizes exactly one view
//!   per namespace, refcounting consumers so views run only while needed
//! - **ManagedUnit trait**: start/stop control surface of the work this
//!   framework drives
//! - **ViewCore / SharedViewService**: reusable machinery for implementing
//!   concrete cluster backends
//! - **LocalClusterService**: in-process backend with programmatic leadership
//!
//! The actual leader election lives in an external backend; this crate only
//! consumes an already-elected leader's identity per namespace. The
//! leadership-driven policy that binds managed units to views lives in
//! `vigil-lifecycle`.

pub mod error;
pub mod local;
pub mod member;
pub mod service;
pub mod unit;
pub mod view;

// Re-export commonly used types for convenience
pub use error::{ClusterError, ClusterResult};
pub use local::{generated_service_id, LocalClusterService, LocalClusterView};
pub use member::{ClusterMember, UnitStatus, ViewState};
pub use service::{ClusterService, SharedViewService, ViewFactory};
pub use unit::ManagedUnit;
pub use view::{ClusterView, DispatchStats, LeadershipListener, ViewCore};
