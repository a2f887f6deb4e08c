//! Cluster services: per-namespace view registries with refcounted lifecycle.

use crate::{ClusterError, ClusterResult, ClusterView};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Constructs the backing view for a namespace.
///
/// Implemented by the concrete membership backend; the rest of the service
/// machinery is backend-agnostic. Construction may fail (backend unreachable,
/// invalid namespace) and that failure surfaces synchronously to the caller
/// requesting the view.
#[async_trait]
pub trait ViewFactory: Send + Sync {
    async fn create_view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>>;
}

/// Single source of truth for cluster views, one per namespace.
///
/// Views are created lazily, memoized for the life of the service, and
/// started/stopped according to consumer demand: a view runs exactly while
/// at least one consumer holds an acquisition. Consumers never call
/// `start`/`stop` on a view directly.
#[async_trait]
pub trait ClusterService: Send + Sync {
    /// Identifier of this service (also the local member identity of the
    /// views it creates).
    fn id(&self) -> &str;

    /// Acquires the view for `namespace`, creating and memoizing it on first
    /// request. Every successful call must be balanced by one
    /// [`release_view`](ClusterService::release_view).
    async fn view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>>;

    /// Releases one acquisition of the namespace's view. The view is stopped
    /// when the last acquisition is released. Releasing without a matching
    /// acquisition is [`ClusterError::UnbalancedRelease`].
    async fn release_view(&self, namespace: &str) -> ClusterResult<()>;

    /// Namespaces for which this service currently holds a view.
    async fn namespaces(&self) -> Vec<String>;
}

struct ViewEntry {
    view: Arc<dyn ClusterView>,
    refcount: usize,
}

/// Generic [`ClusterService`] over a pluggable [`ViewFactory`].
///
/// Handles memoization and refcounting; the factory supplies only the
/// backend-specific view construction. The map and the start/stop side
/// effects are mutated under one lock, so acquisition and release observe
/// refcount transitions atomically.
pub struct SharedViewService<F: ViewFactory> {
    id: String,
    factory: F,
    views: Mutex<HashMap<String, ViewEntry>>,
}

impl<F: ViewFactory> SharedViewService<F> {
    /// Creates a service with the given identifier and view factory.
    pub fn new(id: impl Into<String>, factory: F) -> Self {
        Self {
            id: id.into(),
            factory,
            views: Mutex::new(HashMap::new()),
        }
    }

    /// Current refcount for a namespace, if a view exists for it.
    pub async fn refcount(&self, namespace: &str) -> Option<usize> {
        self.views.lock().await.get(namespace).map(|e| e.refcount)
    }
}

#[async_trait]
impl<F: ViewFactory> ClusterService for SharedViewService<F> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>> {
        let mut views = self.views.lock().await;

        if let Some(entry) = views.get_mut(namespace) {
            entry.refcount += 1;
            if entry.refcount == 1 {
                // Memoized view being re-acquired after its last release
                entry.view.start().await?;
                info!(service = %self.id, namespace, "Restarted cluster view");
            }
            debug!(
                service = %self.id,
                namespace,
                refcount = entry.refcount,
                "Acquired cluster view"
            );
            return Ok(Arc::clone(&entry.view));
        }

        // First request for this namespace. Nothing is registered until the
        // view is fully constructed and started.
        let view = self
            .factory
            .create_view(namespace)
            .await
            .map_err(|e| match e {
                e @ ClusterError::ViewUnavailable { .. } => e,
                other => ClusterError::view_unavailable(namespace, other.to_string()),
            })?;
        view.start().await?;

        views.insert(
            namespace.to_string(),
            ViewEntry {
                view: Arc::clone(&view),
                refcount: 1,
            },
        );
        info!(service = %self.id, namespace, "Created and started cluster view");

        Ok(view)
    }

    async fn release_view(&self, namespace: &str) -> ClusterResult<()> {
        let mut views = self.views.lock().await;

        let entry = match views.get_mut(namespace) {
            Some(entry) if entry.refcount > 0 => entry,
            _ => {
                warn!(service = %self.id, namespace, "Unbalanced cluster view release");
                return Err(ClusterError::UnbalancedRelease {
                    namespace: namespace.to_string(),
                });
            }
        };

        entry.refcount -= 1;
        debug!(
            service = %self.id,
            namespace,
            refcount = entry.refcount,
            "Released cluster view"
        );

        if entry.refcount == 0 {
            entry.view.stop().await?;
            info!(service = %self.id, namespace, "Stopped cluster view");
        }

        Ok(())
    }

    async fn namespaces(&self) -> Vec<String> {
        self.views.lock().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ClusterMember, LeadershipListener, ViewCore, ViewState};

    struct StubView {
        core: ViewCore,
    }

    #[async_trait]
    impl ClusterView for StubView {
        fn namespace(&self) -> &str {
            self.core.namespace()
        }

        fn state(&self) -> ViewState {
            self.core.state()
        }

        async fn leader(&self) -> Option<ClusterMember> {
            None
        }

        async fn local_member(&self) -> ClusterMember {
            ClusterMember::new("stub", true, false)
        }

        async fn members(&self) -> Vec<ClusterMember> {
            Vec::new()
        }

        async fn add_leadership_listener(&self, listener: Arc<dyn LeadershipListener>) {
            self.core.add_listener(listener);
        }

        async fn remove_leadership_listener(&self, listener: &Arc<dyn LeadershipListener>) {
            self.core.remove_listener(listener);
        }

        async fn start(&self) -> ClusterResult<()> {
            self.core.try_start();
            Ok(())
        }

        async fn stop(&self) -> ClusterResult<()> {
            self.core.try_stop();
            Ok(())
        }
    }

    struct StubFactory {
        fail: bool,
    }

    #[async_trait]
    impl ViewFactory for StubFactory {
        async fn create_view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>> {
            if self.fail {
                return Err(ClusterError::view_unavailable(namespace, "backend down"));
            }
            Ok(Arc::new(StubView {
                core: ViewCore::new(namespace),
            }))
        }
    }

    #[tokio::test]
    async fn test_view_is_memoized_per_namespace() {
        let service = SharedViewService::new("svc", StubFactory { fail: false });

        let a = service.view("ns").await.unwrap();
        let b = service.view("ns").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(service.refcount("ns").await, Some(2));

        let other = service.view("other").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn test_refcount_drives_view_lifecycle() {
        let service = SharedViewService::new("svc", StubFactory { fail: false });

        let view = service.view("ns").await.unwrap();
        let _again = service.view("ns").await.unwrap();
        assert_eq!(view.state(), ViewState::Started);

        service.release_view("ns").await.unwrap();
        assert_eq!(view.state(), ViewState::Started);

        service.release_view("ns").await.unwrap();
        assert_eq!(view.state(), ViewState::Stopped);

        // Re-acquiring restarts the same memoized view
        let reacquired = service.view("ns").await.unwrap();
        assert!(Arc::ptr_eq(&view, &reacquired));
        assert_eq!(view.state(), ViewState::Started);
    }

    #[tokio::test]
    async fn test_unbalanced_release_is_an_error() {
        let service = SharedViewService::new("svc", StubFactory { fail: false });

        let err = service.release_view("ns").await.unwrap_err();
        assert!(matches!(err, ClusterError::UnbalancedRelease { .. }));

        let _view = service.view("ns").await.unwrap();
        service.release_view("ns").await.unwrap();
        let err = service.release_view("ns").await.unwrap_err();
        assert!(matches!(err, ClusterError::UnbalancedRelease { .. }));
    }

    #[tokio::test]
    async fn test_factory_failure_leaves_nothing_registered() {
        let service = SharedViewService::new("svc", StubFactory { fail: true });

        let err = service.view("ns").await.unwrap_err();
        assert!(matches!(err, ClusterError::ViewUnavailable { .. }));
        assert!(service.namespaces().await.is_empty());
        assert_eq!(service.refcount("ns").await, None);
    }
}
