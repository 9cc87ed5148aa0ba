//! vgrid-mgmt: the coordinator's control-plane messaging core.
//!
//! Mediates every administrative exchange between the coordinator and the
//! worker dnodes: answering table and vnode configuration requests, pushing
//! placement commands, applying dynamic configuration, and retiring vnodes
//! through the status-driven drop lifecycle.
//!
//! # Architecture
//!
//! ```text
//! transport ──▶ MgmtService::on_inbound (router)
//!                 ├── table cfg / vnode cfg ── MasterAuthority ── MetaStore
//!                 │       └── response + follow-up command
//!                 └── acks ── logged, terminal
//!                                   │
//!                                   ▼
//!                        DispatchGateway
//!                          ├── DirectDispatch ─────────────▶ Transport
//!                          └── QueuedDispatch ── consumer ─▶ Transport
//!
//! StatusMonitor (own timer) ── SlotReports + MetaStore ── DropMonitor
//! ```
//!
//! Handlers run synchronously on the caller's thread. The only suspension
//! points live in the queued dispatcher's consumer and the status timer.

pub mod authority;
pub mod commands;
pub mod deferred;
pub mod dispatch;
pub mod dyncfg;
pub mod envelope;
pub mod error;
pub mod handlers;
pub mod meta;
pub mod router;
pub mod service;
pub mod status;
pub mod wire;

pub use authority::{ClusterRole, MasterAuthority};
pub use deferred::{DeferredAction, DropMonitor, Rebalancer};
pub use dispatch::{
    ChannelTransport, DirectDispatch, DispatchGateway, DispatchStrategy, QueuedDispatch, Transport,
};
pub use dyncfg::{DynCfgOutcome, DynamicOption, OptionError};
pub use envelope::{Envelope, HEADER_LEN};
pub use error::{MgmtError, MgmtResult};
pub use handlers::Ack;
pub use meta::MetaStore;
pub use router::RouteOutcome;
pub use service::MgmtService;
pub use status::{CycleReport, SlotFault, SlotReport, SlotReports, StatusBoard, StatusMonitor, StatusTimer};
pub use wire::{WireError, WireMessage};
