//! Managed-unit control interface.

use crate::{ClusterResult, UnitStatus};
use async_trait::async_trait;

/// Control surface of an independently startable/stoppable piece of work.
///
/// Implemented by the unit-hosting runtime. The lifecycle policy only drives
/// the running state; it never touches the unit's execution semantics.
///
/// `start` and `stop` must be idempotent (starting an already-started unit is
/// a harmless no-op) and must be safe to call from the leadership-event
/// dispatch context. They are control-plane operations and are expected to be
/// reasonably fast.
#[async_trait]
pub trait ManagedUnit: Send + Sync {
    /// Unique identifier of this unit.
    fn id(&self) -> &str;

    /// Whether leadership acquisition should cause this unit to start.
    fn auto_startup(&self) -> bool;

    /// Current externally-owned running status.
    async fn status(&self) -> UnitStatus;

    /// Starts the unit.
    async fn start(&self) -> ClusterResult<()>;

    /// Stops the unit.
    async fn stop(&self) -> ClusterResult<()>;
}
