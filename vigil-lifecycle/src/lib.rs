//! # Vigil Lifecycle - Leadership-Driven Unit Coordination
//!
//! Binds managed units to shared cluster views and keeps each unit's running
//! state synchronized with leadership.
//!
//! This crate provides:
//! - **LifecyclePolicy**: drives every bound unit to Started exactly while
//!   the local node holds leadership for the policy's namespace (and the
//!   unit opted into auto-startup), Stopped otherwise
//! - **ServiceLookup / ServiceRegistry**: the execution-context seam through
//!   which a policy resolves its cluster service on first bind
//!
//! The cluster abstractions themselves (views, services, members, the
//! managed-unit SPI) live in `vigil-core`.

pub mod policy;
pub mod registry;

pub use policy::{desired_status, LifecyclePolicy, PolicyStats};
pub use registry::{ServiceLookup, ServiceRegistry};
