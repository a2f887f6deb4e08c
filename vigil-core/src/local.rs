//! In-process cluster backend.
//!
//! `LocalClusterService` serves single-process deployments and test
//! harnesses: membership is the local node only, and leadership is driven
//! programmatically through [`LocalClusterView::set_leader`] instead of an
//! external election. The lifecycle semantics (memoized views, refcounts,
//! dropped events while stopped) are exactly those of any other backend.

use crate::{
    ClusterMember, ClusterResult, ClusterService, ClusterView, LeadershipListener,
    SharedViewService, ViewCore, ViewFactory, ViewState,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Cluster view whose leadership flag is set programmatically.
pub struct LocalClusterView {
    core: ViewCore,
    member_id: String,
    leader: parking_lot::RwLock<bool>,
}

impl LocalClusterView {
    fn new(namespace: &str, member_id: &str) -> Self {
        Self {
            core: ViewCore::new(namespace),
            member_id: member_id.to_string(),
            leader: parking_lot::RwLock::new(false),
        }
    }

    /// Whether the local member currently holds leadership.
    pub fn is_leader(&self) -> bool {
        *self.leader.read()
    }

    /// Grants or revokes local leadership and fires the leadership event.
    ///
    /// The event is delivered only while the view is Started; otherwise it
    /// is dropped, matching the transitional-race rule for external backends.
    pub async fn set_leader(&self, leader: bool) {
        *self.leader.write() = leader;

        info!(
            namespace = %self.core.namespace(),
            member = %self.member_id,
            leader,
            "Local leadership changed"
        );

        let observed = if leader {
            Some(ClusterMember::new(self.member_id.clone(), true, true))
        } else {
            None
        };
        self.core.fire_leadership_changed(observed).await;
    }
}

#[async_trait]
impl ClusterView for LocalClusterView {
    fn namespace(&self) -> &str {
        self.core.namespace()
    }

    fn state(&self) -> ViewState {
        self.core.state()
    }

    async fn leader(&self) -> Option<ClusterMember> {
        if self.is_leader() {
            Some(self.local_member().await)
        } else {
            None
        }
    }

    async fn local_member(&self) -> ClusterMember {
        ClusterMember::new(self.member_id.clone(), true, self.is_leader())
    }

    async fn members(&self) -> Vec<ClusterMember> {
        vec![self.local_member().await]
    }

    async fn add_leadership_listener(&self, listener: Arc<dyn LeadershipListener>) {
        self.core.add_listener(listener);
    }

    async fn remove_leadership_listener(&self, listener: &Arc<dyn LeadershipListener>) {
        self.core.remove_listener(listener);
    }

    async fn start(&self) -> ClusterResult<()> {
        if self.core.try_start() {
            debug!(namespace = %self.core.namespace(), "Local cluster view started");
        }
        Ok(())
    }

    async fn stop(&self) -> ClusterResult<()> {
        if self.core.try_stop() {
            debug!(namespace = %self.core.namespace(), "Local cluster view stopped");
        }
        Ok(())
    }
}

type LocalViewMap = Arc<parking_lot::Mutex<HashMap<String, Arc<LocalClusterView>>>>;

struct LocalViewFactory {
    member_id: String,
    created: LocalViewMap,
}

#[async_trait]
impl ViewFactory for LocalViewFactory {
    async fn create_view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>> {
        let view = Arc::new(LocalClusterView::new(namespace, &self.member_id));
        self.created
            .lock()
            .insert(namespace.to_string(), Arc::clone(&view));
        Ok(view)
    }
}

/// In-process [`ClusterService`].
///
/// The service id doubles as the local member identity of every view it
/// creates.
pub struct LocalClusterService {
    inner: SharedViewService<LocalViewFactory>,
    views: LocalViewMap,
}

impl LocalClusterService {
    /// Creates a service with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let views: LocalViewMap = Arc::new(parking_lot::Mutex::new(HashMap::new()));
        let factory = LocalViewFactory {
            member_id: id.clone(),
            created: Arc::clone(&views),
        };
        Self {
            inner: SharedViewService::new(id, factory),
            views,
        }
    }

    /// Concrete handle to the namespace's view, if it has been created,
    /// for driving leadership from the embedding process.
    pub fn local_view(&self, namespace: &str) -> Option<Arc<LocalClusterView>> {
        self.views.lock().get(namespace).cloned()
    }

    /// Current refcount for a namespace's view, if one exists.
    pub async fn refcount(&self, namespace: &str) -> Option<usize> {
        self.inner.refcount(namespace).await
    }
}

impl Default for LocalClusterService {
    fn default() -> Self {
        Self::new(generated_service_id("vigil"))
    }
}

#[async_trait]
impl ClusterService for LocalClusterService {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn view(&self, namespace: &str) -> ClusterResult<Arc<dyn ClusterView>> {
        self.inner.view(namespace).await
    }

    async fn release_view(&self, namespace: &str) -> ClusterResult<()> {
        self.inner.release_view(namespace).await
    }

    async fn namespaces(&self) -> Vec<String> {
        self.inner.namespaces().await
    }
}

/// Generates a service id with a short random suffix.
pub fn generated_service_id(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().to_string()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LeadershipListener for CountingListener {
        async fn leadership_changed(&self, _leader: Option<ClusterMember>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_leadership_observation() {
        let service = LocalClusterService::new("node-a");
        let view = service.view("ns").await.unwrap();

        assert!(view.leader().await.is_none());
        let local = view.local_member().await;
        assert_eq!(local.id, "node-a");
        assert!(local.is_local);
        assert!(!local.is_leader);

        service.local_view("ns").unwrap().set_leader(true).await;

        let leader = view.leader().await.unwrap();
        assert_eq!(leader.id, "node-a");
        assert!(leader.is_local);
        assert!(leader.is_leader);
        assert_eq!(view.members().await.len(), 1);
    }

    #[tokio::test]
    async fn test_events_fire_only_while_started() {
        let service = LocalClusterService::new("node-a");
        let view = service.view("ns").await.unwrap();
        let local = service.local_view("ns").unwrap();

        let listener = Arc::new(CountingListener {
            calls: AtomicUsize::new(0),
        });
        view.add_leadership_listener(listener.clone()).await;

        local.set_leader(true).await;
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

        // Last release stops the view; further changes are dropped
        service.release_view("ns").await.unwrap();
        local.set_leader(false).await;
        assert_eq!(listener.calls.load(Ordering::SeqCst), 1);

        // The leadership flag itself still tracks the change
        assert!(!local.is_leader());
    }

    #[tokio::test]
    async fn test_view_handle_is_shared_with_service() {
        let service = LocalClusterService::new("node-a");
        assert!(service.local_view("ns").is_none());

        let view = service.view("ns").await.unwrap();
        let local = service.local_view("ns").unwrap();
        local.set_leader(true).await;

        assert!(view.leader().await.is_some());
    }

    #[test]
    fn test_generated_service_id_prefix() {
        let id = generated_service_id("vigil");
        assert!(id.starts_with("vigil-"));
    }
}

