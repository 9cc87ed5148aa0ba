//! Metadata records held by the coordinator.
//!
//! These types represent the persisted state of worker dnodes, vgroups,
//! databases, and tables. All types are serializable to/from JSON for
//! storage in redb tables.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Exclusive upper bound on a dnode's bandwidth limit, in Mb/s.
pub const MAX_BANDWIDTH_MB: i32 = 10_000_000;

// ── Dnode ─────────────────────────────────────────────────────────

/// A worker node hosting vnodes. Identified by its private address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnodeInfo {
    pub private_ip: Ipv4Addr,
    /// Operator-assigned placement score used by the balancer.
    pub custom_score: i32,
    /// Bandwidth limit in Mb/s, always in `0..MAX_BANDWIDTH_MB`.
    pub bandwidth_mb: i32,
    /// Number of vnode slots reporting active sessions at the last status cycle.
    pub open_vnodes: u32,
    pub status: DnodeStatus,
    /// Set while the dnode is being removed from the cluster.
    pub pending_removal: bool,
    /// Per-slot load table, indexed by vnode number.
    pub vload: Vec<VnodeLoad>,
}

/// Reachability of a dnode as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnodeStatus {
    Offline,
    Ready,
}

/// Snapshot of one vnode slot on a dnode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VnodeLoad {
    pub vnode: u32,
    /// Vgroup the coordinator assigned to this slot; zero when unassigned.
    pub vg_id: u32,
    pub status: VnodeStatus,
    pub drop_status: DropStatus,
    pub total_storage: u64,
    pub comp_storage: u64,
    pub points_written: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VnodeStatus {
    Offline,
    Unsynced,
    Slave,
    Master,
}

/// Drop lifecycle of a vnode slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropStatus {
    Ready,
    /// Drop requested; waiting for the dnode to report the slot vacated.
    Dropping,
}

// ── Vgroup ────────────────────────────────────────────────────────

/// One vnode of a vgroup: the dnode hosting it and its slot number.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VnodeGid {
    pub ip: Ipv4Addr,
    pub vnode: u32,
}

/// A placement group: the vnodes jointly serving one database shard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VgroupInfo {
    pub vg_id: u32,
    pub db_name: String,
    pub vnode_gids: Vec<VnodeGid>,
}

// ── Database ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbInfo {
    pub name: String,
    pub replications: u8,
    pub created_at: u64,
}

// ── Table ─────────────────────────────────────────────────────────

/// A table and the (dnode, vnode, sid) slot it is placed in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableInfo {
    pub table_id: String,
    pub uid: u64,
    pub ip: Ipv4Addr,
    pub vnode: u32,
    pub sid: u32,
    pub vg_id: u32,
    pub sversion: u32,
    pub columns: Vec<ColumnSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub col_type: ColumnType,
    pub bytes: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ColumnType {
    Bool = 1,
    TinyInt = 2,
    SmallInt = 3,
    Int = 4,
    BigInt = 5,
    Float = 6,
    Double = 7,
    Binary = 8,
    Timestamp = 9,
    NChar = 10,
}

impl ColumnType {
    pub fn from_u8(raw: u8) -> Option<Self> {
        let ty = match raw {
            1 => ColumnType::Bool,
            2 => ColumnType::TinyInt,
            3 => ColumnType::SmallInt,
            4 => ColumnType::Int,
            5 => ColumnType::BigInt,
            6 => ColumnType::Float,
            7 => ColumnType::Double,
            8 => ColumnType::Binary,
            9 => ColumnType::Timestamp,
            10 => ColumnType::NChar,
            _ => return None,
        };
        Some(ty)
    }
}

impl DnodeInfo {
    /// A fresh dnode with `num_vnodes` idle slots.
    pub fn new(private_ip: Ipv4Addr, num_vnodes: u32) -> Self {
        Self {
            private_ip,
            custom_score: 0,
            bandwidth_mb: 0,
            open_vnodes: 0,
            status: DnodeStatus::Ready,
            pending_removal: false,
            vload: (0..num_vnodes).map(VnodeLoad::idle).collect(),
        }
    }

    /// Build the key for the dnodes table.
    pub fn table_key(&self) -> String {
        self.private_ip.to_string()
    }
}

impl VnodeLoad {
    pub fn idle(vnode: u32) -> Self {
        Self {
            vnode,
            vg_id: 0,
            status: VnodeStatus::Offline,
            drop_status: DropStatus::Ready,
            total_storage: 0,
            comp_storage: 0,
            points_written: 0,
        }
    }
}

impl VgroupInfo {
    pub fn table_key(&self) -> String {
        self.vg_id.to_string()
    }
}

impl TableInfo {
    /// Build the location key for the table_locations index.
    pub fn location_key(&self) -> String {
        location_key(self.ip, self.vnode, self.sid)
    }
}

pub fn vnode_key(ip: Ipv4Addr, vnode: u32) -> String {
    format!("{ip}:{vnode}")
}

pub fn location_key(ip: Ipv4Addr, vnode: u32, sid: u32) -> String {
    format!("{ip}:{vnode}:{sid}")
}
