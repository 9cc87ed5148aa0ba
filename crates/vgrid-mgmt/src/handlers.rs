//! Request and response handlers.
//!
//! Request handlers check authority on every call, resolve their target
//! through the metadata store and reply with the paired response type. A
//! successful reply is followed by one command to the requesting worker.
//! Acknowledgement handlers only record what came back.

use bytes::Bytes;
use tracing::{debug, info, warn};
use vgrid_core::{Handle, MsgType, ResultCode};

use crate::error::MgmtResult;
use crate::service::MgmtService;
use crate::wire::{TableCfgMsg, VpeerCfgMsg, WireMessage};

/// Outcome of a command as acknowledged by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub kind: MsgType,
    pub handle: Handle,
    /// Raw code as received. Workers may send codes the coordinator does not know.
    pub code: i32,
}

impl Ack {
    pub fn result(&self) -> Option<ResultCode> {
        ResultCode::from_i32(self.code)
    }

    pub fn is_success(&self) -> bool {
        self.result().is_some_and(ResultCode::is_success)
    }
}

impl MgmtService {
    fn reply(&self, conn: Handle, request: MsgType, code: ResultCode) -> MgmtResult<ResultCode> {
        // Requests always have a paired response type.
        let rsp = request.response().unwrap_or(request);
        self.gateway.send_response(conn, rsp, code, Bytes::new())?;
        Ok(code)
    }

    /// A worker asks which table lives in `(ip, vnode, sid)`.
    pub fn process_table_cfg(&self, payload: &[u8], conn: Handle) -> MgmtResult<ResultCode> {
        let req = TableCfgMsg::decode(payload)?;

        if !self.authority.is_master() {
            debug!(ip = %req.ip, vnode = req.vnode, sid = req.sid, "not master, redirecting table cfg");
            return self.reply(conn, MsgType::TableCfg, ResultCode::Redirect);
        }

        let Some(table) = self.store.table_by_location(req.ip, req.vnode, req.sid)? else {
            warn!(ip = %req.ip, vnode = req.vnode, sid = req.sid, "table cfg: no table at location");
            return self.reply(conn, MsgType::TableCfg, ResultCode::InvalidTable);
        };

        debug!(ip = %req.ip, vnode = req.vnode, sid = req.sid, table = %table.table_id, "table cfg resolved");
        let code = self.reply(conn, MsgType::TableCfg, ResultCode::Success)?;
        self.send_create_table(&table, None)?;
        Ok(code)
    }

    /// A worker asks for the peers of one of its vnodes.
    pub fn process_vnode_cfg(&self, payload: &[u8], conn: Handle) -> MgmtResult<ResultCode> {
        let req = VpeerCfgMsg::decode(payload)?;

        if !self.authority.is_master() {
            debug!(ip = %req.ip, vnode = req.vnode, "not master, redirecting vnode cfg");
            return self.reply(conn, MsgType::VnodeCfg, ResultCode::Redirect);
        }

        let Some(vgroup) = self.store.vgroup_by_vnode(req.ip, req.vnode)? else {
            debug!(ip = %req.ip, vnode = req.vnode, "vnode cfg: vnode not active");
            return self.reply(conn, MsgType::VnodeCfg, ResultCode::NotActiveVnode);
        };

        debug!(ip = %req.ip, vnode = req.vnode, vg_id = vgroup.vg_id, "vnode cfg resolved");
        let code = self.reply(conn, MsgType::VnodeCfg, ResultCode::Success)?;
        self.send_vpeers(&vgroup, req.ip, req.vnode, None)?;
        Ok(code)
    }

    /// Record an acknowledgement of a command sent earlier.
    pub fn process_ack(&self, kind: MsgType, handle: Handle, code: i32) -> Ack {
        let ack = Ack { kind, handle, code };
        match ack.result() {
            Some(ResultCode::Success) => debug!(msg = %kind, %handle, "command acknowledged"),
            Some(result) => info!(msg = %kind, %handle, code = %result, "command rejected by worker"),
            None => warn!(msg = %kind, %handle, code, "ack with unknown result code"),
        }
        ack
    }
}
