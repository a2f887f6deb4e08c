//! Core value types for cluster membership and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A point-in-time observation of a cluster member.
///
/// Produced on demand by a [`ClusterView`](crate::ClusterView); the leadership
/// flag reflects the moment the member was observed and does not update live.
/// Callers must re-fetch from the view to see changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMember {
    /// Unique member identifier
    pub id: String,

    /// Whether this member is the observing node itself
    pub is_local: bool,

    /// Whether this member held leadership at observation time
    pub is_leader: bool,
}

impl ClusterMember {
    /// Creates a member observation with the given identity and flags.
    pub fn new(id: impl Into<String>, is_local: bool, is_leader: bool) -> Self {
        Self {
            id: id.into(),
            is_local,
            is_leader,
        }
    }

    /// Creates a member observation with a generated identity.
    pub fn with_generated_id(is_local: bool, is_leader: bool) -> Self {
        Self::new(Uuid::new_v4().to_string(), is_local, is_leader)
    }
}

impl fmt::Display for ClusterMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.id,
            if self.is_local { " (local)" } else { "" },
            if self.is_leader { " (leader)" } else { "" }
        )
    }
}

/// Lifecycle state of a cluster view.
///
/// Views can be restarted: `Created -> Started -> Stopped -> Started -> ...`
/// No state is terminal for the view itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewState {
    /// Constructed but never started
    Created,

    /// Actively delivering leadership events
    Started,

    /// Stopped; leadership events are dropped
    Stopped,
}

/// Externally-owned running status of a managed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Not running
    Stopped,

    /// Startup in progress
    Starting,

    /// Running
    Started,

    /// Shutdown in progress
    Stopping,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitStatus::Stopped => "Stopped",
            UnitStatus::Starting => "Starting",
            UnitStatus::Started => "Started",
            UnitStatus::Stopping => "Stopping",
        };
        write!(f, "{}", s)
    }
}
