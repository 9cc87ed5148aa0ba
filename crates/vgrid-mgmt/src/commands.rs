//! Outbound command builders and senders.

use std::net::Ipv4Addr;

use bytes::Bytes;
use tracing::{debug, error};
use vgrid_core::{Handle, MsgType};
use vgrid_state::{TableInfo, VgroupInfo};

use crate::error::MgmtResult;
use crate::service::MgmtService;
use crate::wire::{CreateTableMsg, FreeVnodeMsg, RemoveTableMsg, VPeersMsg, WireError, WireMessage};

pub fn build_create_table(table: &TableInfo) -> Result<Bytes, WireError> {
    CreateTableMsg::from(table).to_bytes()
}

pub fn build_remove_table(table: &TableInfo) -> Result<Bytes, WireError> {
    RemoveTableMsg::from(table).to_bytes()
}

pub fn build_vpeers(vgroup: &VgroupInfo, vnode: u32) -> Result<Bytes, WireError> {
    VPeersMsg::for_vnode(vgroup, vnode)?.to_bytes()
}

pub fn build_free_vnode(vnode: u32) -> Result<Bytes, WireError> {
    FreeVnodeMsg { vnode }.to_bytes()
}

impl MgmtService {
    /// Send the table definition to the worker hosting it.
    pub fn send_create_table(&self, table: &TableInfo, handle: Option<Handle>) -> MgmtResult<()> {
        let payload = build_create_table(table)?;
        debug!(table = %table.table_id, ip = %table.ip, vnode = table.vnode, sid = table.sid, "sending create table");
        self.gateway
            .send_command(table.ip, MsgType::DnodeCreateTable, payload, handle)
    }

    pub fn send_remove_table(&self, table: &TableInfo, handle: Option<Handle>) -> MgmtResult<()> {
        let payload = build_remove_table(table)?;
        debug!(table = %table.table_id, ip = %table.ip, vnode = table.vnode, sid = table.sid, "sending remove table");
        self.gateway
            .send_command(table.ip, MsgType::DnodeRemoveTable, payload, handle)
    }

    /// Send the peer set of `vgroup` to the worker at `ip` hosting `vnode`.
    pub fn send_vpeers(
        &self,
        vgroup: &VgroupInfo,
        ip: Ipv4Addr,
        vnode: u32,
        handle: Option<Handle>,
    ) -> MgmtResult<()> {
        let payload = build_vpeers(vgroup, vnode)?;
        debug!(%ip, vnode, vg_id = vgroup.vg_id, peers = vgroup.vnode_gids.len(), "sending vpeers");
        self.gateway
            .send_command(ip, MsgType::DnodeVPeers, payload, handle)
    }

    pub fn send_one_free_vnode(&self, ip: Ipv4Addr, vnode: u32, handle: Option<Handle>) -> MgmtResult<()> {
        let payload = build_free_vnode(vnode)?;
        debug!(%ip, vnode, "sending free vnode");
        self.gateway
            .send_command(ip, MsgType::DnodeFreeVnode, payload, handle)
    }

    /// Free every vnode of `vgroup` on its worker.
    ///
    /// Every gid is attempted; the first failure is returned afterwards.
    pub fn send_free_vnodes(&self, vgroup: &VgroupInfo, handle: Option<Handle>) -> MgmtResult<()> {
        let mut first_err = None;
        for gid in &vgroup.vnode_gids {
            if let Err(e) = self.send_one_free_vnode(gid.ip, gid.vnode, handle) {
                error!(ip = %gid.ip, vnode = gid.vnode, vg_id = vgroup.vg_id, error = %e, "free vnode not sent");
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
