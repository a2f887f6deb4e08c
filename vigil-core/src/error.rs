//! Error types for cluster lifecycle coordination.

use thiserror::Error;

/// Result type for cluster coordination operations
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while coordinating cluster views and managed units
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The cluster view for a namespace could not be constructed or retrieved
    #[error("Cluster view for namespace '{namespace}' is unavailable: {reason}")]
    ViewUnavailable { namespace: String, reason: String },

    /// A view was released without a matching prior acquisition
    #[error("Unbalanced release of cluster view for namespace '{namespace}'")]
    UnbalancedRelease { namespace: String },

    /// Starting or stopping a managed unit failed
    #[error("Control call failed for unit '{unit_id}': {reason}")]
    UnitControl { unit_id: String, reason: String },

    /// Internal system error
    #[error("Internal system error: {message}")]
    Internal { message: String },
}

impl ClusterError {
    /// Creates a view-unavailable error for the given namespace.
    pub fn view_unavailable(namespace: impl Into<String>, reason: impl Into<String>) -> Self {
        ClusterError::ViewUnavailable {
            namespace: namespace.into(),
            reason: reason.into(),
        }
    }

    /// Creates a unit-control error for the given unit.
    pub fn unit_control(unit_id: impl Into<String>, reason: impl Into<String>) -> Self {
        ClusterError::UnitControl {
            unit_id: unit_id.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that indicate a bookkeeping bug in the caller
    /// rather than a transient condition worth retrying.
    pub fn is_programming_error(&self) -> bool {
        matches!(self, ClusterError::UnbalancedRelease { .. })
    }
}

impl From<anyhow::Error> for ClusterError {
    fn from(err: anyhow::Error) -> Self {
        ClusterError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClusterError::view_unavailable("orders", "backend unreachable");
        assert_eq!(
            err.to_string(),
            "Cluster view for namespace 'orders' is unavailable: backend unreachable"
        );
    }

    #[test]
    fn test_programming_error_classification() {
        let err = ClusterError::UnbalancedRelease {
            namespace: "orders".to_string(),
        };
        assert!(err.is_programming_error());

        let err = ClusterError::unit_control("foo", "timeout");
        assert!(!err.is_programming_error());
    }
}
