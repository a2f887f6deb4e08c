//! Managed-unit doubles.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use vigil_core::{ClusterError, ClusterResult, ManagedUnit, UnitStatus};

/// A [`ManagedUnit`] that tracks its own status and records control calls.
///
/// Start/stop are idempotent at the call-counting level too: a redundant
/// command (already at the target status) is still recorded if issued, so
/// tests can assert that the policy suppressed it.
pub struct RecordingUnit {
    id: String,
    auto_startup: bool,
    status: parking_lot::Mutex<UnitStatus>,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
}

impl RecordingUnit {
    pub fn new(id: impl Into<String>, auto_startup: bool) -> Self {
        Self {
            id: id.into(),
            auto_startup,
            status: parking_lot::Mutex::new(UnitStatus::Stopped),
            start_calls: AtomicUsize::new(0),
            stop_calls: AtomicUsize::new(0),
            fail_start: AtomicBool::new(false),
            fail_stop: AtomicBool::new(false),
        }
    }

    /// Makes subsequent `start` calls fail until cleared.
    pub fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `stop` calls fail until cleared.
    pub fn fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Current status without going through the async trait.
    pub fn current_status(&self) -> UnitStatus {
        *self.status.lock()
    }

    /// Forces a status, simulating an external trigger outside the policy.
    pub fn force_status(&self, status: UnitStatus) {
        *self.status.lock() = status;
    }
}

#[async_trait]
impl ManagedUnit for RecordingUnit {
    fn id(&self) -> &str {
        &self.id
    }

    fn auto_startup(&self) -> bool {
        self.auto_startup
    }

    async fn status(&self) -> UnitStatus {
        *self.status.lock()
    }

    async fn start(&self) -> ClusterResult<()> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(ClusterError::unit_control(&self.id, "injected start failure"));
        }
        *self.status.lock() = UnitStatus::Started;
        Ok(())
    }

    async fn stop(&self) -> ClusterResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(ClusterError::unit_control(&self.id, "injected stop failure"));
        }
        *self.status.lock() = UnitStatus::Stopped;
        Ok(())
    }
}
