//! Cluster-backend doubles.

use async_trait::async_trait;
use std::sync::Arc;
use vigil_core::{ClusterError, ClusterResult, ClusterService, ClusterView};

/// A [`ClusterService`] whose backend is permanently unreachable.
///
/// Every view request fails synchronously, for exercising the
/// view-unavailable path in bind and bootstrap code.
pub struct UnavailableClusterService {
    id: String,
}

impl UnavailableClusterService {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl ClusterService for UnavailableClusterService {
    fn id(&self) -> &str {
        &self.id
    }

    async fn view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>> {
        Err(ClusterError::view_unavailable(
            namespace,
            "cluster backend unreachable",
        ))
    }

    async fn release_view(&self, namespace: &str) -> ClusterResult<()> {
        // No view was ever handed out, so any release is unbalanced.
        Err(ClusterError::UnbalancedRelease {
            namespace: namespace.to_string(),
        })
    }

    async fn namespaces(&self) -> Vec<String> {
        Vec::new()
    }
}
