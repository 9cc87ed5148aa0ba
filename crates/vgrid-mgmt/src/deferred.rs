//! Deferred side effects: rebalance passes and database-drop checks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Placement scheduler, asked to rebalance after a score change.
pub trait Rebalancer: Send + Sync {
    fn request_rebalance(&self, delay: Duration);
}

/// Database-drop monitor, asked to re-check after a vnode finishes dropping.
pub trait DropMonitor: Send + Sync {
    fn schedule_drop_check(&self, delay: Duration);
}

pub type DeferredCallback = Arc<dyn Fn() + Send + Sync>;

/// Runs a callback once after a delay on the current tokio runtime.
#[derive(Clone)]
pub struct DeferredAction {
    name: &'static str,
    callback: DeferredCallback,
}

impl DeferredAction {
    pub fn new(name: &'static str, callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            name,
            callback: Arc::new(callback),
        }
    }

    /// A deferred action that only logs when it fires.
    pub fn logging(name: &'static str) -> Self {
        Self::new(name, move || debug!(action = name, "deferred action fired"))
    }

    /// Returns `None` when called outside a runtime; nothing is scheduled.
    pub fn schedule(&self, delay: Duration) -> Option<JoinHandle<()>> {
        let Ok(rt) = tokio::runtime::Handle::try_current() else {
            error!(action = self.name, "no runtime available, deferred action not scheduled");
            return None;
        };
        debug!(action = self.name, delay_ms = delay.as_millis() as u64, "deferred action scheduled");
        let callback = Arc::clone(&self.callback);
        Some(rt.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        }))
    }
}

impl Rebalancer for DeferredAction {
    fn request_rebalance(&self, delay: Duration) {
        self.schedule(delay);
    }
}

impl DropMonitor for DeferredAction {
    fn schedule_drop_check(&self, delay: Duration) {
        self.schedule(delay);
    }
}
