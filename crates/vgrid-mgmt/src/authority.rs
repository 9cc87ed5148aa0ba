//! Master authority guard.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

/// Answers "is this coordinator the cluster master right now?".
///
/// Request handlers ask once per request. Mastership can change between
/// two messages on the same connection, so the answer is never cached.
pub trait MasterAuthority: Send + Sync {
    fn is_master(&self) -> bool;
}

/// Cluster role owned by the membership layer.
#[derive(Debug, Default)]
pub struct ClusterRole {
    master: AtomicBool,
}

impl ClusterRole {
    pub fn new(master: bool) -> Self {
        Self {
            master: AtomicBool::new(master),
        }
    }

    pub fn set_master(&self, master: bool) {
        let was = self.master.swap(master, Ordering::SeqCst);
        if was != master {
            info!(master, "cluster role changed");
        }
    }
}

impl MasterAuthority for ClusterRole {
    fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }
}
