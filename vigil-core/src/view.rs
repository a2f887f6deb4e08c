//! Namespace-scoped cluster views and leadership event dispatch.

use crate::{ClusterMember, ClusterResult, ViewState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Callback registered on a cluster view for leadership changes.
///
/// Listeners absorb their own failures; the view delivers the event to every
/// registered listener regardless of what earlier listeners did with it.
#[async_trait]
pub trait LeadershipListener: Send + Sync {
    /// Invoked with the new leader value whenever leadership changes.
    ///
    /// `None` means no leader is currently observed for the namespace.
    async fn leadership_changed(&self, leader: Option<ClusterMember>);
}

/// Membership and leadership state holder for one namespace.
///
/// Implemented by concrete cluster backends; consumers never depend on a
/// backend type. Exactly one view exists per namespace per owning
/// [`ClusterService`](crate::ClusterService), and only that service drives
/// `start`/`stop`.
#[async_trait]
pub trait ClusterView: Send + Sync {
    /// The namespace this view covers.
    fn namespace(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> ViewState;

    /// The current leader, or `None` if none is observed.
    async fn leader(&self) -> Option<ClusterMember>;

    /// The caller's own node, including its current leadership flag.
    async fn local_member(&self) -> ClusterMember;

    /// Full visible membership, in backend order. May be empty; membership
    /// discovery itself is external.
    async fn members(&self) -> Vec<ClusterMember>;

    /// Registers a leadership listener. Idempotent per listener identity;
    /// listeners are notified in registration order.
    async fn add_leadership_listener(&self, listener: Arc<dyn LeadershipListener>);

    /// Removes a previously registered listener. Removing an unknown
    /// listener is a no-op.
    async fn remove_leadership_listener(&self, listener: &Arc<dyn LeadershipListener>);

    /// Starts the view. Idempotent; a second call while Started has no
    /// side effects.
    async fn start(&self) -> ClusterResult<()>;

    /// Stops the view. Idempotent. A stopped view can be started again.
    async fn stop(&self) -> ClusterResult<()>;
}

impl std::fmt::Debug for dyn ClusterView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterView")
            .field("namespace", &self.namespace())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Statistics about leadership event dispatch
#[derive(Debug, Default, Clone)]
pub struct DispatchStats {
    pub events_fired: u64,
    pub events_dropped: u64,
    pub listeners_notified: u64,
}

/// Reusable nucleus for [`ClusterView`] implementations.
///
/// Owns the pieces every backend needs: lifecycle state, the
/// registration-ordered listener list, and the dispatch serialization lock.
/// Backends embed a `ViewCore` and delegate state and listener handling to
/// it, keeping only leadership observation for themselves.
pub struct ViewCore {
    namespace: String,
    state: parking_lot::RwLock<ViewState>,
    listeners: parking_lot::Mutex<Vec<Arc<dyn LeadershipListener>>>,
    // Held across the whole fan-out so no two leadership dispatches
    // run concurrently for the same view.
    dispatch: Mutex<()>,
    stats: parking_lot::Mutex<DispatchStats>,
}

impl ViewCore {
    /// Creates a core for the given namespace, in state `Created`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: parking_lot::RwLock::new(ViewState::Created),
            listeners: parking_lot::Mutex::new(Vec::new()),
            dispatch: Mutex::new(()),
            stats: parking_lot::Mutex::new(DispatchStats::default()),
        }
    }

    /// The namespace this core covers.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ViewState {
        *self.state.read()
    }

    /// Transitions `Created`/`Stopped` to `Started`.
    ///
    /// Returns whether the transition happened, so backends can run their
    /// startup side effect exactly once per transition.
    pub fn try_start(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            ViewState::Created | ViewState::Stopped => {
                *state = ViewState::Started;
                true
            }
            ViewState::Started => false,
        }
    }

    /// Transitions `Started` to `Stopped`. Returns whether the transition
    /// happened.
    pub fn try_stop(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            ViewState::Started => {
                *state = ViewState::Stopped;
                true
            }
            ViewState::Created | ViewState::Stopped => false,
        }
    }

    /// Registers a listener, keyed by `Arc` identity. Re-adding a listener
    /// that is already registered is a no-op.
    pub fn add_listener(&self, listener: Arc<dyn LeadershipListener>) {
        let mut listeners = self.listeners.lock();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes a listener by `Arc` identity. Unknown listeners are ignored.
    pub fn remove_listener(&self, listener: &Arc<dyn LeadershipListener>) {
        self.listeners.lock().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Dispatch statistics.
    pub fn stats(&self) -> DispatchStats {
        self.stats.lock().clone()
    }

    /// Delivers a leadership change to every registered listener, in
    /// registration order.
    ///
    /// Only delivers while the view is `Started`; an event arriving at a
    /// stopped or not-yet-started view is dropped without error (transitional
    /// race between the backend and the owning service). Successive calls are
    /// serialized; each listener sees events in the order they were fired.
    pub async fn fire_leadership_changed(&self, leader: Option<ClusterMember>) {
        let _dispatch = self.dispatch.lock().await;

        if self.state() != ViewState::Started {
            trace!(
                namespace = %self.namespace,
                "Dropping leadership event for non-started view"
            );
            self.stats.lock().events_dropped += 1;
            return;
        }

        let snapshot: Vec<Arc<dyn LeadershipListener>> = self.listeners.lock().clone();

        debug!(
            namespace = %self.namespace,
            listeners = snapshot.len(),
            leader = ?leader.as_ref().map(|m| m.id.as_str()),
            "Dispatching leadership change"
        );

        for listener in &snapshot {
            listener.leadership_changed(leader.clone()).await;
        }

        let mut stats = self.stats.lock();
        stats.events_fired += 1;
        stats.listeners_notified += snapshot.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingListener {
        calls: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LeadershipListener for CountingListener {
        async fn leadership_changed(&self, _leader: Option<ClusterMember>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_state_transitions_are_idempotent() {
        let core = ViewCore::new("ns");
        assert_eq!(core.state(), ViewState::Created);

        assert!(core.try_start());
        assert!(!core.try_start());
        assert_eq!(core.state(), ViewState::Started);

        assert!(core.try_stop());
        assert!(!core.try_stop());
        assert_eq!(core.state(), ViewState::Stopped);

        // Restart after stop
        assert!(core.try_start());
        assert_eq!(core.state(), ViewState::Started);
    }

    #[test]
    fn test_listener_registration_is_idempotent() {
        let core = ViewCore::new("ns");
        let listener = CountingListener::new();
        let as_dyn: Arc<dyn LeadershipListener> = listener.clone();

        core.add_listener(as_dyn.clone());
        core.add_listener(as_dyn.clone());
        assert_eq!(core.listener_count(), 1);

        core.remove_listener(&as_dyn);
        assert_eq!(core.listener_count(), 0);

        // Removing again is a no-op
        core.remove_listener(&as_dyn);
        assert_eq!(core.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_events_dropped_unless_started() {
        let core = ViewCore::new("ns");
        let listener = CountingListener::new();
        core.add_listener(listener.clone());

        // Created: dropped
        core.fire_leadership_changed(None).await;
        assert_eq!(listener.calls(), 0);

        core.try_start();
        core.fire_leadership_changed(None).await;
        assert_eq!(listener.calls(), 1);

        core.try_stop();
        core.fire_leadership_changed(None).await;
        assert_eq!(listener.calls(), 1);

        let stats = core.stats();
        assert_eq!(stats.events_fired, 1);
        assert_eq!(stats.events_dropped, 2);
    }

    #[tokio::test]
    async fn test_dispatch_reaches_listeners_in_registration_order() {
        struct OrderListener {
            tag: usize,
            order: Arc<parking_lot::Mutex<Vec<usize>>>,
        }

        #[async_trait]
        impl LeadershipListener for OrderListener {
            async fn leadership_changed(&self, _leader: Option<ClusterMember>) {
                self.order.lock().push(self.tag);
            }
        }

        let core = ViewCore::new("ns");
        core.try_start();

        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for tag in 0..3 {
            core.add_listener(Arc::new(OrderListener {
                tag,
                order: order.clone(),
            }));
        }

        core.fire_leadership_changed(Some(ClusterMember::new("n1", true, true)))
            .await;
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }
}
