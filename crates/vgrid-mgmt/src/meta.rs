//! Metadata lookups the messaging core depends on.
//!
//! The core never holds a record across calls. Dnode changes go through
//! [`MetaStore::update_dnode_with`], which reads, mutates and writes the
//! record in one store transaction, so concurrent updates do not overwrite
//! each other.

use std::net::Ipv4Addr;

use vgrid_state::{DbInfo, DnodeInfo, StateResult, StateStore, TableInfo, VgroupInfo};

pub trait MetaStore: Send + Sync {
    fn table_by_location(&self, ip: Ipv4Addr, vnode: u32, sid: u32) -> StateResult<Option<TableInfo>>;

    fn vgroup_by_vnode(&self, ip: Ipv4Addr, vnode: u32) -> StateResult<Option<VgroupInfo>>;

    fn vgroup(&self, vg_id: u32) -> StateResult<Option<VgroupInfo>>;

    fn database(&self, name: &str) -> StateResult<Option<DbInfo>>;

    fn dnode(&self, ip: Ipv4Addr) -> StateResult<Option<DnodeInfo>>;

    fn list_dnodes(&self) -> StateResult<Vec<DnodeInfo>>;

    /// Apply `f` to the stored dnode and persist the result atomically.
    /// Returns the updated record, or `None` if the dnode does not exist.
    fn update_dnode_with(
        &self,
        ip: Ipv4Addr,
        f: &mut dyn FnMut(&mut DnodeInfo),
    ) -> StateResult<Option<DnodeInfo>>;
}

impl MetaStore for StateStore {
    fn table_by_location(&self, ip: Ipv4Addr, vnode: u32, sid: u32) -> StateResult<Option<TableInfo>> {
        StateStore::table_by_location(self, ip, vnode, sid)
    }

    fn vgroup_by_vnode(&self, ip: Ipv4Addr, vnode: u32) -> StateResult<Option<VgroupInfo>> {
        StateStore::vgroup_by_vnode(self, ip, vnode)
    }

    fn vgroup(&self, vg_id: u32) -> StateResult<Option<VgroupInfo>> {
        self.get_vgroup(vg_id)
    }

    fn database(&self, name: &str) -> StateResult<Option<DbInfo>> {
        self.get_database(name)
    }

    fn dnode(&self, ip: Ipv4Addr) -> StateResult<Option<DnodeInfo>> {
        self.get_dnode(ip)
    }

    fn list_dnodes(&self) -> StateResult<Vec<DnodeInfo>> {
        StateStore::list_dnodes(self)
    }

    fn update_dnode_with(
        &self,
        ip: Ipv4Addr,
        f: &mut dyn FnMut(&mut DnodeInfo),
    ) -> StateResult<Option<DnodeInfo>> {
        StateStore::update_dnode_with(self, ip, |dnode| {
            f(dnode);
            dnode.clone()
        })
    }
}
