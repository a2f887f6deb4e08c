//! Execution-context resolution of the cluster service.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use vigil_core::{ClusterError, ClusterResult, ClusterService};

/// Supplies the cluster service a lifecycle policy binds through.
///
/// Implemented by the hosting runtime. Policies hold a lookup, not a
/// service: resolution happens on first bind, so a policy definition can be
/// created before the surrounding context exists.
#[async_trait]
pub trait ServiceLookup: Send + Sync {
    async fn cluster_service(&self) -> ClusterResult<Arc<dyn ClusterService>>;
}

/// In-process [`ServiceLookup`] holding at most one registered service.
pub struct ServiceRegistry {
    service: RwLock<Option<Arc<dyn ClusterService>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            service: RwLock::new(None),
        }
    }

    /// Registers the cluster service policies resolve through.
    /// Re-registering replaces the previous service.
    pub async fn register(&self, service: Arc<dyn ClusterService>) {
        let mut slot = self.service.write().await;
        if let Some(previous) = slot.as_ref() {
            warn!(
                previous = %previous.id(),
                new = %service.id(),
                "Replacing registered cluster service"
            );
        } else {
            debug!(service = %service.id(), "Registered cluster service");
        }
        *slot = Some(service);
    }

    /// Whether a service is currently registered.
    pub async fn is_registered(&self) -> bool {
        self.service.read().await.is_some()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceLookup for ServiceRegistry {
    async fn cluster_service(&self) -> ClusterResult<Arc<dyn ClusterService>> {
        self.service
            .read()
            .await
            .clone()
            .ok_or_else(|| ClusterError::Internal {
                message: "no cluster service registered".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::LocalClusterService;

    #[tokio::test]
    async fn test_lookup_fails_until_registered() {
        let registry = ServiceRegistry::new();
        assert!(!registry.is_registered().await);
        assert!(registry.cluster_service().await.is_err());

        registry
            .register(Arc::new(LocalClusterService::new("svc")))
            .await;
        assert!(registry.is_registered().await);

        let service = registry.cluster_service().await.unwrap();
        assert_eq!(service.id(), "svc");
    }
}
