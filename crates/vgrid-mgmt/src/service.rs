//! The coordinator's messaging service.
//!
//! [`MgmtService`] bundles the collaborators every request path needs. The
//! router, request and response handlers, command senders and dynamic
//! configuration are all methods on it, spread over their own modules.

use std::sync::Arc;
use std::time::Duration;

use vgrid_core::config::DEFAULT_BALANCE_DELAY;

use crate::authority::MasterAuthority;
use crate::deferred::{DeferredAction, Rebalancer};
use crate::dispatch::DispatchGateway;
use crate::meta::MetaStore;

#[derive(Clone)]
pub struct MgmtService {
    pub(crate) store: Arc<dyn MetaStore>,
    pub(crate) authority: Arc<dyn MasterAuthority>,
    pub(crate) gateway: DispatchGateway,
    pub(crate) rebalancer: Arc<dyn Rebalancer>,
    pub(crate) balance_delay: Duration,
}

impl MgmtService {
    pub fn new(
        store: Arc<dyn MetaStore>,
        authority: Arc<dyn MasterAuthority>,
        gateway: DispatchGateway,
    ) -> Self {
        Self {
            store,
            authority,
            gateway,
            rebalancer: Arc::new(DeferredAction::logging("rebalance")),
            balance_delay: DEFAULT_BALANCE_DELAY,
        }
    }

    pub fn with_rebalancer(mut self, rebalancer: Arc<dyn Rebalancer>) -> Self {
        self.rebalancer = rebalancer;
        self
    }

    /// Delay between a score change and the rebalance pass it requests.
    pub fn with_balance_delay(mut self, delay: Duration) -> Self {
        self.balance_delay = delay;
        self
    }

    pub fn gateway(&self) -> &DispatchGateway {
        &self.gateway
    }

    pub fn is_master(&self) -> bool {
        self.authority.is_master()
    }
}
