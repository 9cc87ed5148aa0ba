//! Fixed-layout payload records exchanged with workers.
//!
//! Every multi-byte integer is big-endian (network order) on the wire.
//! Records are decoded as soon as they arrive and encoded right before
//! dispatch, so nothing in memory is ever held in network order. Strings
//! are UTF-8 with a `u16` length prefix; addresses travel as `u32`.
//!
//! ```text
//! TableCfgMsg    ip(4) vnode(4) sid(4)
//! VpeerCfgMsg    ip(4) vnode(4)
//! CreateTableMsg cont_len(4) table_id(str) vnode(4) sid(4) uid(8) sversion(4)
//!                ncols(2) { name(str) type(1) bytes(2) }*
//! RemoveTableMsg table_id(str) vnode(4) sid(4) uid(8)
//! VPeersMsg      vnode(4) vg_id(4) db_name(str) replicas(1) npeers(2) { ip(4) vnode(4) }*
//! FreeVnodeMsg   vnode(4)
//! CfgDnodeMsg    ip(4) config(str)
//! ```

use std::net::Ipv4Addr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use vgrid_state::{ColumnSchema, ColumnType, TableInfo, VgroupInfo};

/// Errors raised while encoding or decoding a wire record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("{what} truncated: need {need} bytes, got {got}")]
    Truncated {
        what: &'static str,
        need: usize,
        got: usize,
    },

    #[error("unknown message type: {0}")]
    UnknownMsgType(u8),

    #[error("unknown result code: {0}")]
    UnknownResultCode(i32),

    #[error("unknown column type: {0}")]
    UnknownColumnType(u8),

    #[error("declared length {declared} does not match {actual} bytes present")]
    LengthMismatch { declared: i64, actual: usize },

    #[error("{0} is not valid utf-8")]
    InvalidUtf8(&'static str),

    #[error("{what} too long: {len} bytes")]
    TooLong { what: &'static str, len: usize },
}

/// A record with a fixed big-endian layout.
pub trait WireMessage: Sized {
    const NAME: &'static str;

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError>;

    fn decode(buf: &[u8]) -> Result<Self, WireError>;

    fn to_bytes(&self) -> Result<Bytes, WireError> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }
}

// ── Inbound requests ──────────────────────────────────────────────

/// A worker asking for the definition of the table in one of its slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCfgMsg {
    pub ip: Ipv4Addr,
    pub vnode: u32,
    pub sid: u32,
}

impl WireMessage for TableCfgMsg {
    const NAME: &'static str = "table cfg";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(u32::from(self.ip));
        buf.put_u32(self.vnode);
        buf.put_u32(self.sid);
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 12, Self::NAME)?;
        Ok(Self {
            ip: Ipv4Addr::from(buf.get_u32()),
            vnode: buf.get_u32(),
            sid: buf.get_u32(),
        })
    }
}

/// A worker asking for the peer set of one of its vnodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VpeerCfgMsg {
    pub ip: Ipv4Addr,
    pub vnode: u32,
}

impl WireMessage for VpeerCfgMsg {
    const NAME: &'static str = "vpeer cfg";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(u32::from(self.ip));
        buf.put_u32(self.vnode);
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 8, Self::NAME)?;
        Ok(Self {
            ip: Ipv4Addr::from(buf.get_u32()),
            vnode: buf.get_u32(),
        })
    }
}

// ── Outbound commands ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTableMsg {
    pub table_id: String,
    pub vnode: u32,
    pub sid: u32,
    pub uid: u64,
    pub sversion: u32,
    pub columns: Vec<ColumnDesc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    pub name: String,
    pub col_type: ColumnType,
    pub bytes: u16,
}

impl From<&TableInfo> for CreateTableMsg {
    fn from(table: &TableInfo) -> Self {
        Self {
            table_id: table.table_id.clone(),
            vnode: table.vnode,
            sid: table.sid,
            uid: table.uid,
            sversion: table.sversion,
            columns: table.columns.iter().map(ColumnDesc::from).collect(),
        }
    }
}

impl From<&ColumnSchema> for ColumnDesc {
    fn from(col: &ColumnSchema) -> Self {
        Self {
            name: col.name.clone(),
            col_type: col.col_type,
            bytes: col.bytes,
        }
    }
}

impl WireMessage for CreateTableMsg {
    const NAME: &'static str = "create table";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        let start = buf.len();
        // cont_len placeholder, patched once the body is written.
        buf.put_u32(0);
        put_str(buf, &self.table_id, "table id")?;
        buf.put_u32(self.vnode);
        buf.put_u32(self.sid);
        buf.put_u64(self.uid);
        buf.put_u32(self.sversion);
        buf.put_u16(count_u16(self.columns.len(), "column list")?);
        for col in &self.columns {
            put_str(buf, &col.name, "column name")?;
            buf.put_u8(col.col_type as u8);
            buf.put_u16(col.bytes);
        }
        let cont_len = buf.len() - start;
        let cont_len = u32::try_from(cont_len).map_err(|_| WireError::TooLong {
            what: Self::NAME,
            len: cont_len,
        })?;
        buf[start..start + 4].copy_from_slice(&cont_len.to_be_bytes());
        Ok(())
    }

    fn decode(buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 4, Self::NAME)?;
        let cont_len = (&buf[..4]).get_u32() as usize;
        if cont_len < 4 || cont_len > buf.len() {
            return Err(WireError::LengthMismatch {
                declared: cont_len as i64,
                actual: buf.len(),
            });
        }
        let mut body = &buf[4..cont_len];
        let table_id = get_str(&mut body, "table id")?;
        need(body, 22, Self::NAME)?;
        let vnode = body.get_u32();
        let sid = body.get_u32();
        let uid = body.get_u64();
        let sversion = body.get_u32();
        let ncols = body.get_u16() as usize;
        let mut columns = Vec::with_capacity(ncols);
        for _ in 0..ncols {
            let name = get_str(&mut body, "column name")?;
            need(body, 3, "column")?;
            let raw = body.get_u8();
            let col_type = ColumnType::from_u8(raw).ok_or(WireError::UnknownColumnType(raw))?;
            columns.push(ColumnDesc {
                name,
                col_type,
                bytes: body.get_u16(),
            });
        }
        Ok(Self {
            table_id,
            vnode,
            sid,
            uid,
            sversion,
            columns,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveTableMsg {
    pub table_id: String,
    pub vnode: u32,
    pub sid: u32,
    pub uid: u64,
}

impl From<&TableInfo> for RemoveTableMsg {
    fn from(table: &TableInfo) -> Self {
        Self {
            table_id: table.table_id.clone(),
            vnode: table.vnode,
            sid: table.sid,
            uid: table.uid,
        }
    }
}

impl WireMessage for RemoveTableMsg {
    const NAME: &'static str = "remove table";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        put_str(buf, &self.table_id, "table id")?;
        buf.put_u32(self.vnode);
        buf.put_u32(self.sid);
        buf.put_u64(self.uid);
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        let table_id = get_str(&mut buf, "table id")?;
        need(buf, 16, Self::NAME)?;
        Ok(Self {
            table_id,
            vnode: buf.get_u32(),
            sid: buf.get_u32(),
            uid: buf.get_u64(),
        })
    }
}

/// The full peer set of one vnode, sent to the worker hosting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VPeersMsg {
    pub vnode: u32,
    pub vg_id: u32,
    pub db_name: String,
    pub replicas: u8,
    pub peers: Vec<VPeerDesc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VPeerDesc {
    pub ip: Ipv4Addr,
    pub vnode: u32,
}

impl VPeersMsg {
    pub fn for_vnode(vgroup: &VgroupInfo, vnode: u32) -> Result<Self, WireError> {
        let peers: Vec<VPeerDesc> = vgroup
            .vnode_gids
            .iter()
            .map(|gid| VPeerDesc {
                ip: gid.ip,
                vnode: gid.vnode,
            })
            .collect();
        let replicas = u8::try_from(peers.len()).map_err(|_| WireError::TooLong {
            what: "replica count",
            len: peers.len(),
        })?;
        Ok(Self {
            vnode,
            vg_id: vgroup.vg_id,
            db_name: vgroup.db_name.clone(),
            replicas,
            peers,
        })
    }
}

impl WireMessage for VPeersMsg {
    const NAME: &'static str = "vpeers";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(self.vnode);
        buf.put_u32(self.vg_id);
        put_str(buf, &self.db_name, "db name")?;
        buf.put_u8(self.replicas);
        buf.put_u16(count_u16(self.peers.len(), "peer list")?);
        for peer in &self.peers {
            buf.put_u32(u32::from(peer.ip));
            buf.put_u32(peer.vnode);
        }
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 8, Self::NAME)?;
        let vnode = buf.get_u32();
        let vg_id = buf.get_u32();
        let db_name = get_str(&mut buf, "db name")?;
        need(buf, 3, Self::NAME)?;
        let replicas = buf.get_u8();
        let npeers = buf.get_u16() as usize;
        need(buf, npeers * 8, "peer list")?;
        let peers = (0..npeers)
            .map(|_| VPeerDesc {
                ip: Ipv4Addr::from(buf.get_u32()),
                vnode: buf.get_u32(),
            })
            .collect();
        Ok(Self {
            vnode,
            vg_id,
            db_name,
            replicas,
            peers,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeVnodeMsg {
    pub vnode: u32,
}

impl WireMessage for FreeVnodeMsg {
    const NAME: &'static str = "free vnode";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(self.vnode);
        Ok(())
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 4, Self::NAME)?;
        Ok(Self {
            vnode: buf.get_u32(),
        })
    }
}

/// A raw configuration string pushed to a worker's own config system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfgDnodeMsg {
    pub ip: Ipv4Addr,
    pub config: String,
}

impl WireMessage for CfgDnodeMsg {
    const NAME: &'static str = "cfg dnode";

    fn encode(&self, buf: &mut BytesMut) -> Result<(), WireError> {
        buf.put_u32(u32::from(self.ip));
        put_str(buf, &self.config, "config")
    }

    fn decode(mut buf: &[u8]) -> Result<Self, WireError> {
        need(buf, 4, Self::NAME)?;
        let ip = Ipv4Addr::from(buf.get_u32());
        let config = get_str(&mut buf, "config")?;
        Ok(Self { ip, config })
    }
}

// ── Helpers ───────────────────────────────────────────────────────

pub(crate) fn need(buf: &[u8], need: usize, what: &'static str) -> Result<(), WireError> {
    if buf.len() < need {
        return Err(WireError::Truncated {
            what,
            need,
            got: buf.len(),
        });
    }
    Ok(())
}

fn count_u16(len: usize, what: &'static str) -> Result<u16, WireError> {
    u16::try_from(len).map_err(|_| WireError::TooLong { what, len })
}

fn put_str(buf: &mut BytesMut, s: &str, what: &'static str) -> Result<(), WireError> {
    buf.put_u16(count_u16(s.len(), what)?);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn get_str(buf: &mut &[u8], what: &'static str) -> Result<String, WireError> {
    need(buf, 2, what)?;
    let len = buf.get_u16() as usize;
    need(buf, len, what)?;
    let s = std::str::from_utf8(&buf[..len])
        .map_err(|_| WireError::InvalidUtf8(what))?
        .to_string();
    buf.advance(len);
    Ok(s)
}
