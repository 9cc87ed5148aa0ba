//! In-process worker endpoint for the standalone topology.
//!
//! Receives what the coordinator dispatches, keeps the status board in step
//! with the commands it "executes", and acknowledges each command back
//! through the router the way a remote worker would.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use vgrid_core::{Handle, MsgType, ResultCode};
use vgrid_mgmt::wire::{CreateTableMsg, FreeVnodeMsg, VPeersMsg, VpeerCfgMsg, WireMessage};
use vgrid_mgmt::{Envelope, MgmtService, SlotReport, StatusBoard};

pub struct LocalWorker {
    ip: Ipv4Addr,
    vnodes: u32,
    service: MgmtService,
    board: Arc<StatusBoard>,
}

impl LocalWorker {
    pub fn new(ip: Ipv4Addr, vnodes: u32, service: MgmtService, board: Arc<StatusBoard>) -> Self {
        Self {
            ip,
            vnodes,
            service,
            board,
        }
    }

    /// Ask for the peers of every slot, then serve the inbox until shutdown.
    pub async fn run(self, mut inbox: mpsc::UnboundedReceiver<Envelope>, mut shutdown: watch::Receiver<bool>) {
        info!(ip = %self.ip, vnodes = self.vnodes, "local worker started");
        self.request_vnode_cfg();

        loop {
            tokio::select! {
                msg = inbox.recv() => match msg {
                    Some(envelope) => self.handle(envelope),
                    None => break,
                },
                _ = shutdown.changed() => {
                    info!("local worker shutting down");
                    break;
                }
            }
        }
    }

    fn request_vnode_cfg(&self) {
        for vnode in 0..self.vnodes {
            let payload = match (VpeerCfgMsg { ip: self.ip, vnode }).to_bytes() {
                Ok(p) => p,
                Err(e) => {
                    warn!(vnode, error = %e, "failed to encode vnode cfg request");
                    continue;
                }
            };
            let conn = Handle(u64::from(vnode));
            if let Err(e) = self.service.on_inbound(MsgType::VnodeCfg.as_u8(), &payload, conn, 0) {
                warn!(vnode, error = %e, "vnode cfg request failed");
            }
        }
    }

    fn handle(&self, envelope: Envelope) {
        if envelope.is_response() {
            debug!(msg = %envelope.msg_type, code = %envelope.code, "response received");
            return;
        }

        let code = match self.execute(&envelope) {
            Ok(()) => ResultCode::Success,
            Err(e) => {
                warn!(msg = %envelope.msg_type, error = %e, "command rejected");
                ResultCode::InvalidSql
            }
        };

        let Some(ack) = envelope.msg_type.response() else {
            return;
        };
        let handle = envelope.handle.unwrap_or(Handle(0));
        if let Err(e) = self.service.on_inbound(ack.as_u8(), &[], handle, code.as_i32()) {
            warn!(msg = %ack, error = %e, "ack not routed");
        }
    }

    fn execute(&self, envelope: &Envelope) -> Result<(), vgrid_mgmt::WireError> {
        match envelope.msg_type {
            MsgType::DnodeVPeers => {
                let msg = VPeersMsg::decode(&envelope.payload)?;
                info!(vnode = msg.vnode, vg_id = msg.vg_id, db = %msg.db_name, "vnode opened");
                self.board.record(
                    self.ip,
                    msg.vnode,
                    SlotReport {
                        sessions: 1,
                        vg_id: msg.vg_id,
                        ..SlotReport::default()
                    },
                );
            }
            MsgType::DnodeFreeVnode => {
                let msg = FreeVnodeMsg::decode(&envelope.payload)?;
                info!(vnode = msg.vnode, "vnode freed");
                self.board.record(self.ip, msg.vnode, SlotReport::default());
            }
            MsgType::DnodeCreateTable => {
                let msg = CreateTableMsg::decode(&envelope.payload)?;
                debug!(table = %msg.table_id, vnode = msg.vnode, sid = msg.sid, "table created");
            }
            other => debug!(msg = %other, len = envelope.len(), "command accepted"),
        }
        Ok(())
    }
}
