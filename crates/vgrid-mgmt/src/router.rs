//! Inbound message router.
//!
//! The single entry point the transport calls for every control message a
//! worker sends to the coordinator.

use tracing::{error, trace, warn};
use vgrid_core::{Handle, MsgType, ResultCode};

use crate::error::MgmtResult;
use crate::handlers::Ack;
use crate::service::MgmtService;

/// What the router did with an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A request handler replied with this code.
    Replied(ResultCode),
    /// An acknowledgement was recorded.
    Acknowledged(Ack),
    /// A known message with nothing to do on the coordinator.
    Ignored(MsgType),
    /// Unknown type, or a type only the coordinator sends. Logged and dropped.
    Dropped { raw_type: u8 },
}

impl MgmtService {
    /// Route one inbound control message.
    ///
    /// `code` is the result code the sender attached; only acknowledgements
    /// look at it. An `Err` means a request could not be decoded or its reply
    /// could not be dispatched.
    pub fn on_inbound(
        &self,
        raw_type: u8,
        payload: &[u8],
        handle: Handle,
        code: i32,
    ) -> MgmtResult<RouteOutcome> {
        let Some(msg_type) = MsgType::from_u8(raw_type) else {
            error!(raw_type, %handle, len = payload.len(), "unknown message type, dropped");
            return Ok(RouteOutcome::Dropped { raw_type });
        };
        trace!(msg = %msg_type, %handle, len = payload.len(), code, "inbound message");

        let outcome = match msg_type {
            MsgType::TableCfg => RouteOutcome::Replied(self.process_table_cfg(payload, handle)?),
            MsgType::VnodeCfg => RouteOutcome::Replied(self.process_vnode_cfg(payload, handle)?),

            MsgType::DnodeCreateTableRsp
            | MsgType::DnodeRemoveTableRsp
            | MsgType::DnodeVPeersRsp
            | MsgType::DnodeFreeVnodeRsp => {
                RouteOutcome::Acknowledged(self.process_ack(msg_type, handle, code))
            }

            MsgType::DnodeCfgRsp | MsgType::AlterStreamRsp => RouteOutcome::Ignored(msg_type),

            MsgType::DnodeCreateTable
            | MsgType::DnodeRemoveTable
            | MsgType::DnodeVPeers
            | MsgType::DnodeFreeVnode
            | MsgType::DnodeCfg
            | MsgType::AlterStream
            | MsgType::TableCfgRsp
            | MsgType::VnodeCfgRsp => {
                warn!(msg = %msg_type, %handle, "coordinator-bound message of outbound type, dropped");
                RouteOutcome::Dropped { raw_type }
            }
        };
        Ok(outcome)
    }
}
