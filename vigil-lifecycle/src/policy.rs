//! Leadership-driven lifecycle policy for managed units.

use crate::ServiceLookup;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use vigil_core::{
    ClusterError, ClusterMember, ClusterResult, ClusterService, ClusterView, LeadershipListener,
    ManagedUnit, UnitStatus,
};

/// Statistics about policy decisions
#[derive(Debug, Default, Clone)]
pub struct PolicyStats {
    pub leadership_events: u64,
    pub decisions_applied: u64,
    pub applies_failed: u64,
}

/// The desired status of a unit given a leadership observation.
///
/// A unit should run exactly when the observed leader is the local member
/// and the unit opted into auto-startup; with no leader at all, every unit's
/// decision is Stopped.
pub fn desired_status(leader: Option<&ClusterMember>, auto_startup: bool) -> UnitStatus {
    let local_leader = leader.map_or(false, |m| m.is_local);
    if local_leader && auto_startup {
        UnitStatus::Started
    } else {
        UnitStatus::Stopped
    }
}

struct PolicyInner {
    service: Option<Arc<dyn ClusterService>>,
    view: Option<Arc<dyn ClusterView>>,
    // Insertion order; fan-out iterates a snapshot of this in bind order.
    bound: Vec<Arc<dyn ManagedUnit>>,
}

/// Keeps the running state of bound managed units synchronized with cluster
/// leadership for one namespace.
///
/// A single policy may drive many units. The first bound unit acquires the
/// namespace's shared view from the cluster service (starting it if needed)
/// and registers the policy as a leadership listener; the last unbound unit
/// releases the view again. Every bind and every leadership change
/// re-evaluates the decision for the affected units, so units added while
/// leadership is already held start immediately.
///
/// The policy only drives toward its computed decision on bind and on
/// leadership events; it does not continuously police external interference
/// with a unit's state.
pub struct LifecyclePolicy {
    namespace: String,
    context: parking_lot::Mutex<Option<Arc<dyn ServiceLookup>>>,
    listener: Arc<PolicyEventListener>,
    inner: Mutex<PolicyInner>,
    stats: parking_lot::Mutex<PolicyStats>,
}

impl LifecyclePolicy {
    /// Creates a policy for the given namespace.
    ///
    /// The policy holds no cluster service reference yet; attach the
    /// execution context with [`set_context`](LifecyclePolicy::set_context)
    /// before the first bind.
    pub fn for_namespace(namespace: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| Self {
            namespace: namespace.into(),
            context: parking_lot::Mutex::new(None),
            listener: Arc::new(PolicyEventListener {
                policy: weak.clone(),
            }),
            inner: Mutex::new(PolicyInner {
                service: None,
                view: None,
                bound: Vec::new(),
            }),
            stats: parking_lot::Mutex::new(PolicyStats::default()),
        })
    }

    /// The namespace this policy coordinates.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Attaches the execution context the cluster service is resolved from.
    pub fn set_context(&self, lookup: Arc<dyn ServiceLookup>) {
        *self.context.lock() = Some(lookup);
    }

    /// Ids of the currently bound units, in bind order.
    pub async fn bound_units(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .bound
            .iter()
            .map(|u| u.id().to_string())
            .collect()
    }

    /// Policy statistics.
    pub fn stats(&self) -> PolicyStats {
        self.stats.lock().clone()
    }

    /// Binds a unit to this policy and applies the current leadership
    /// decision to it immediately.
    ///
    /// The first bind overall resolves the cluster service from the attached
    /// context and acquires the namespace's shared view; failure to do so is
    /// [`ClusterError::ViewUnavailable`] and leaves the unit unbound.
    /// Binding an already-bound unit is a no-op.
    ///
    /// A failed immediate apply is reported as
    /// [`ClusterError::UnitControl`], but the unit stays bound and is
    /// re-evaluated on the next leadership event.
    pub async fn bind(&self, unit: Arc<dyn ManagedUnit>) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;

        let view = match &inner.view {
            Some(view) => Arc::clone(view),
            None => {
                let (service, view) = self.acquire_view().await?;
                inner.service = Some(service);
                inner.view = Some(Arc::clone(&view));
                view
            }
        };

        if inner.bound.iter().any(|u| u.id() == unit.id()) {
            trace!(namespace = %self.namespace, unit = unit.id(), "Unit already bound");
            return Ok(());
        }
        inner.bound.push(Arc::clone(&unit));
        info!(
            namespace = %self.namespace,
            unit = unit.id(),
            bound = inner.bound.len(),
            "Bound unit to lifecycle policy"
        );

        // Evaluate against the current snapshot so late joiners start at
        // once if leadership is already held. The apply itself runs outside
        // the policy lock.
        let leader = view.leader().await;
        drop(inner);

        self.apply_decision(&unit, leader.as_ref()).await
    }

    /// Unbinds a unit. Idempotent; unknown ids are ignored.
    ///
    /// Does not stop the unit, only stops driving it. When the last unit is
    /// unbound the policy deregisters its listener and releases the shared
    /// view, which stops the view if this was its last acquisition.
    pub async fn unbind(&self, unit_id: &str) -> ClusterResult<()> {
        let mut inner = self.inner.lock().await;

        let before = inner.bound.len();
        inner.bound.retain(|u| u.id() != unit_id);
        if inner.bound.len() == before {
            return Ok(());
        }
        info!(
            namespace = %self.namespace,
            unit = unit_id,
            bound = inner.bound.len(),
            "Unbound unit from lifecycle policy"
        );

        if inner.bound.is_empty() {
            if let (Some(view), Some(service)) = (inner.view.take(), inner.service.take()) {
                let listener: Arc<dyn LeadershipListener> = self.listener.clone();
                view.remove_leadership_listener(&listener).await;
                service.release_view(&self.namespace).await?;
            }
        }

        Ok(())
    }

    /// Resolves the cluster service from the execution context and acquires
    /// the namespace view, registering this policy as a leadership listener.
    async fn acquire_view(
        &self,
    ) -> ClusterResult<(Arc<dyn ClusterService>, Arc<dyn ClusterView>)> {
        let lookup = self.context.lock().clone().ok_or_else(|| {
            ClusterError::view_unavailable(&self.namespace, "no execution context attached")
        })?;

        let service = lookup.cluster_service().await.map_err(|e| match e {
            e @ ClusterError::ViewUnavailable { .. } => e,
            other => ClusterError::view_unavailable(&self.namespace, other.to_string()),
        })?;

        let view = service.view(&self.namespace).await?;
        view.add_leadership_listener(self.listener.clone()).await;

        debug!(
            namespace = %self.namespace,
            service = service.id(),
            "Acquired shared cluster view"
        );
        Ok((service, view))
    }

    /// Recomputes and applies the decision for every bound unit, in bind
    /// order. Invoked from the view's serialized dispatch.
    async fn on_leadership_changed(&self, leader: Option<ClusterMember>) {
        self.stats.lock().leadership_events += 1;

        // Defensive copy: bind/unbind may run concurrently with the apply
        // loop, but must not interleave with iteration of the bound set.
        let snapshot: Vec<Arc<dyn ManagedUnit>> = self.inner.lock().await.bound.clone();

        debug!(
            namespace = %self.namespace,
            units = snapshot.len(),
            leader = ?leader.as_ref().map(|m| m.id.as_str()),
            "Applying leadership decision to bound units"
        );

        for unit in &snapshot {
            // A failing unit must not keep the rest of the pass from running.
            if let Err(e) = self.apply_decision(unit, leader.as_ref()).await {
                warn!(
                    namespace = %self.namespace,
                    unit = unit.id(),
                    error = %e,
                    "Failed to apply leadership decision"
                );
            }
        }
    }

    /// Drives one unit toward its desired status, issuing a start or stop
    /// command only when the current status differs.
    async fn apply_decision(
        &self,
        unit: &Arc<dyn ManagedUnit>,
        leader: Option<&ClusterMember>,
    ) -> ClusterResult<()> {
        let desired = desired_status(leader, unit.auto_startup());
        let current = unit.status().await;

        if current == desired {
            trace!(
                namespace = %self.namespace,
                unit = unit.id(),
                status = %current,
                "Unit already at desired status"
            );
            return Ok(());
        }

        debug!(
            namespace = %self.namespace,
            unit = unit.id(),
            from = %current,
            to = %desired,
            "Driving unit toward leadership decision"
        );

        let result = match desired {
            UnitStatus::Started => unit.start().await,
            _ => unit.stop().await,
        };

        let mut stats = self.stats.lock();
        match result {
            Ok(()) => {
                stats.decisions_applied += 1;
                Ok(())
            }
            Err(e) => {
                stats.applies_failed += 1;
                Err(match e {
                    e @ ClusterError::UnitControl { .. } => e,
                    other => ClusterError::unit_control(unit.id(), other.to_string()),
                })
            }
        }
    }
}

/// Listener handle registered on the shared view.
///
/// Holds a weak reference so a dropped policy cannot be kept alive (or
/// called back) through a view that outlives it.
struct PolicyEventListener {
    policy: Weak<LifecyclePolicy>,
}

#[async_trait]
impl LeadershipListener for PolicyEventListener {
    async fn leadership_changed(&self, leader: Option<ClusterMember>) {
        if let Some(policy) = self.policy.upgrade() {
            policy.on_leadership_changed(leader).await;
        }
    }
}
