//! StateStore: redb-backed metadata persistence for the coordinator.
//!
//! Provides typed CRUD over dnodes, vgroups, databases, and tables, plus
//! the location lookups the messaging core resolves inbound requests with.
//! All values are JSON-serialized into redb's `&[u8]` value columns. The
//! store supports both on-disk and in-memory backends (the latter for
//! testing).

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableHandle};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe metadata store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        for def in [DNODES, VGROUPS, VNODE_OWNERS, DATABASES, TABLES, TABLE_LOCATIONS] {
            txn.open_table(def).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Dnodes ─────────────────────────────────────────────────────

    /// Insert or update a dnode.
    pub fn put_dnode(&self, dnode: &DnodeInfo) -> StateResult<()> {
        check_bandwidth(dnode)?;
        self.put_record(DNODES, &dnode.table_key(), dnode)
    }

    /// Read, mutate, and write back a dnode inside one write transaction.
    ///
    /// Returns `None` without writing when the dnode does not exist. The
    /// record is only rewritten if `f` changed it.
    pub fn update_dnode_with<R>(
        &self,
        ip: Ipv4Addr,
        f: impl FnOnce(&mut DnodeInfo) -> R,
    ) -> StateResult<Option<R>> {
        let key = ip.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let outcome = {
            let mut dnodes = txn.open_table(DNODES).map_err(map_err!(Table))?;
            let current: Option<DnodeInfo> =
                match dnodes.get(key.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => {
                        Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                    }
                    None => None,
                };
            match current {
                Some(mut dnode) => {
                    let before = dnode.clone();
                    let out = f(&mut dnode);
                    if dnode != before {
                        check_bandwidth(&dnode)?;
                        let value = serde_json::to_vec(&dnode).map_err(map_err!(Serialize))?;
                        dnodes
                            .insert(key.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                    }
                    Some(out)
                }
                None => None,
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%ip, found = outcome.is_some(), "dnode updated in place");
        Ok(outcome)
    }

    /// Get a dnode by its private address.
    pub fn get_dnode(&self, ip: Ipv4Addr) -> StateResult<Option<DnodeInfo>> {
        self.get_record(DNODES, &ip.to_string())
    }

    pub fn list_dnodes(&self) -> StateResult<Vec<DnodeInfo>> {
        self.list_records(DNODES)
    }

    /// Delete a dnode. Returns true if it existed.
    pub fn delete_dnode(&self, ip: Ipv4Addr) -> StateResult<bool> {
        self.delete_record(DNODES, &ip.to_string())
    }

    // ── Vgroups ────────────────────────────────────────────────────

    /// Insert or update a vgroup and re-index its vnode gids.
    pub fn put_vgroup(&self, vgroup: &VgroupInfo) -> StateResult<()> {
        let key = vgroup.table_key();
        let value = serde_json::to_vec(vgroup).map_err(map_err!(Serialize))?;
        let owner = serde_json::to_vec(&vgroup.vg_id).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut vgroups = txn.open_table(VGROUPS).map_err(map_err!(Table))?;
            let previous: Option<VgroupInfo> =
                match vgroups.get(key.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => {
                        Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                    }
                    None => None,
                };
            vgroups
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut owners = txn.open_table(VNODE_OWNERS).map_err(map_err!(Table))?;
            // Drop index entries for gids the new version no longer lists,
            // unless another vgroup has claimed the slot since.
            for gid in previous.iter().flat_map(|p| p.vnode_gids.iter()) {
                let slot = vnode_key(gid.ip, gid.vnode);
                if index_points_at(&owners, &slot, &vgroup.vg_id)? {
                    owners.remove(slot.as_str()).map_err(map_err!(Write))?;
                }
            }
            for gid in &vgroup.vnode_gids {
                owners
                    .insert(vnode_key(gid.ip, gid.vnode).as_str(), owner.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(vg_id = vgroup.vg_id, db = %vgroup.db_name, "vgroup stored");
        Ok(())
    }

    pub fn get_vgroup(&self, vg_id: u32) -> StateResult<Option<VgroupInfo>> {
        self.get_record(VGROUPS, &vg_id.to_string())
    }

    /// Find the vgroup that lists `(ip, vnode)` among its vnode gids.
    pub fn vgroup_by_vnode(&self, ip: Ipv4Addr, vnode: u32) -> StateResult<Option<VgroupInfo>> {
        match self.get_record::<u32>(VNODE_OWNERS, &vnode_key(ip, vnode))? {
            Some(vg_id) => self.get_vgroup(vg_id),
            None => Ok(None),
        }
    }

    /// Delete a vgroup and the index entries it still owns. Returns true if
    /// it existed.
    pub fn delete_vgroup(&self, vg_id: u32) -> StateResult<bool> {
        let key = vg_id.to_string();
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut vgroups = txn.open_table(VGROUPS).map_err(map_err!(Table))?;
            let removed: Option<VgroupInfo> =
                match vgroups.remove(key.as_str()).map_err(map_err!(Write))? {
                    Some(guard) => {
                        Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                    }
                    None => None,
                };
            let mut owners = txn.open_table(VNODE_OWNERS).map_err(map_err!(Table))?;
            for gid in removed.iter().flat_map(|v| v.vnode_gids.iter()) {
                let slot = vnode_key(gid.ip, gid.vnode);
                if index_points_at(&owners, &slot, &vg_id)? {
                    owners.remove(slot.as_str()).map_err(map_err!(Write))?;
                }
            }
            removed.is_some()
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(vg_id, existed, "vgroup deleted");
        Ok(existed)
    }

    // ── Databases ──────────────────────────────────────────────────

    pub fn put_database(&self, db: &DbInfo) -> StateResult<()> {
        self.put_record(DATABASES, &db.name, db)
    }

    pub fn get_database(&self, name: &str) -> StateResult<Option<DbInfo>> {
        self.get_record(DATABASES, name)
    }

    pub fn delete_database(&self, name: &str) -> StateResult<bool> {
        self.delete_record(DATABASES, name)
    }

    // ── Tables ─────────────────────────────────────────────────────

    /// Insert or update a table and its location index entry.
    pub fn put_table(&self, table: &TableInfo) -> StateResult<()> {
        let value = serde_json::to_vec(table).map_err(map_err!(Serialize))?;
        let id = serde_json::to_vec(&table.table_id).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut tables = txn.open_table(TABLES).map_err(map_err!(Table))?;
            let previous: Option<TableInfo> =
                match tables.get(table.table_id.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => {
                        Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                    }
                    None => None,
                };
            tables
                .insert(table.table_id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;

            let mut locations = txn.open_table(TABLE_LOCATIONS).map_err(map_err!(Table))?;
            if let Some(prev) = previous {
                let slot = prev.location_key();
                if index_points_at(&locations, &slot, &table.table_id)? {
                    locations.remove(slot.as_str()).map_err(map_err!(Write))?;
                }
            }
            locations
                .insert(table.location_key().as_str(), id.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = %table.table_id, location = %table.location_key(), "table stored");
        Ok(())
    }

    pub fn get_table(&self, table_id: &str) -> StateResult<Option<TableInfo>> {
        self.get_record(TABLES, table_id)
    }

    /// Resolve the table placed at `(ip, vnode, sid)`.
    pub fn table_by_location(
        &self,
        ip: Ipv4Addr,
        vnode: u32,
        sid: u32,
    ) -> StateResult<Option<TableInfo>> {
        match self.get_record::<String>(TABLE_LOCATIONS, &location_key(ip, vnode, sid))? {
            Some(table_id) => self.get_table(&table_id),
            None => Ok(None),
        }
    }

    /// Delete a table and its location entry, if the entry still names this
    /// table. Returns true if it existed.
    pub fn delete_table(&self, table_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut tables = txn.open_table(TABLES).map_err(map_err!(Table))?;
            let removed: Option<TableInfo> =
                match tables.remove(table_id).map_err(map_err!(Write))? {
                    Some(guard) => {
                        Some(serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?)
                    }
                    None => None,
                };
            if let Some(table) = &removed {
                let mut locations = txn.open_table(TABLE_LOCATIONS).map_err(map_err!(Table))?;
                let slot = table.location_key();
                if index_points_at(&locations, &slot, &table.table_id)? {
                    locations.remove(slot.as_str()).map_err(map_err!(Write))?;
                }
            }
            removed.is_some()
        };
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = %table_id, existed, "table deleted");
        Ok(existed)
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn put_record<T: Serialize>(&self, def: JsonTable, key: &str, record: &T) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = def.name(), %key, "record stored");
        Ok(())
    }

    fn get_record<T: DeserializeOwned>(&self, def: JsonTable, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: T =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn list_records<T: DeserializeOwned>(&self, def: JsonTable) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(def).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: T =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    fn delete_record(&self, def: JsonTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(def).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(table = def.name(), %key, existed, "record deleted");
        Ok(existed)
    }
}

fn check_bandwidth(dnode: &DnodeInfo) -> StateResult<()> {
    if !(0..MAX_BANDWIDTH_MB).contains(&dnode.bandwidth_mb) {
        return Err(StateError::Invalid(format!(
            "dnode {} bandwidth {} out of range",
            dnode.private_ip, dnode.bandwidth_mb
        )));
    }
    Ok(())
}

/// Whether the index entry at `key` still names `owner`.
fn index_points_at<T: DeserializeOwned + PartialEq>(
    index: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
    owner: &T,
) -> StateResult<bool> {
    match index.get(key).map_err(map_err!(Read))? {
        Some(guard) => {
            let current: T = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
            Ok(current == *owner)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    fn test_table(id: &str, host: Ipv4Addr, vnode: u32, sid: u32) -> TableInfo {
        TableInfo {
            table_id: id.to_string(),
            uid: 42,
            ip: host,
            vnode,
            sid,
            vg_id: 1,
            sversion: 1,
            columns: vec![ColumnSchema {
                name: "ts".to_string(),
                col_type: ColumnType::Timestamp,
                bytes: 8,
            }],
        }
    }

    fn test_vgroup(vg_id: u32, gids: &[(Ipv4Addr, u32)]) -> VgroupInfo {
        VgroupInfo {
            vg_id,
            db_name: "db1".to_string(),
            vnode_gids: gids
                .iter()
                .map(|&(ip, vnode)| VnodeGid { ip, vnode })
                .collect(),
        }
    }

    // ── Dnode CRUD ─────────────────────────────────────────────────

    #[test]
    fn dnode_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let dnode = DnodeInfo::new(ip(5), 4);

        store.put_dnode(&dnode).unwrap();
        assert_eq!(store.get_dnode(ip(5)).unwrap(), Some(dnode));
        assert!(store.get_dnode(ip(6)).unwrap().is_none());
    }

    #[test]
    fn dnode_rejects_out_of_range_bandwidth() {
        let store = StateStore::open_in_memory().unwrap();
        let mut dnode = DnodeInfo::new(ip(5), 1);
        dnode.bandwidth_mb = MAX_BANDWIDTH_MB;

        assert!(matches!(store.put_dnode(&dnode), Err(StateError::Invalid(_))));
        dnode.bandwidth_mb = -1;
        assert!(matches!(store.put_dnode(&dnode), Err(StateError::Invalid(_))));
        assert!(store.get_dnode(ip(5)).unwrap().is_none());
    }

    #[test]
    fn dnode_list_and_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_dnode(&DnodeInfo::new(ip(1), 2)).unwrap();
        store.put_dnode(&DnodeInfo::new(ip(2), 2)).unwrap();
        assert_eq!(store.list_dnodes().unwrap().len(), 2);

        assert!(store.delete_dnode(ip(1)).unwrap());
        assert!(!store.delete_dnode(ip(1)).unwrap());
        assert_eq!(store.list_dnodes().unwrap().len(), 1);
    }

    #[test]
    fn dnode_vload_updates_persist() {
        let store = StateStore::open_in_memory().unwrap();
        let mut dnode = DnodeInfo::new(ip(1), 3);
        store.put_dnode(&dnode).unwrap();

        dnode.vload[2].drop_status = DropStatus::Dropping;
        dnode.vload[2].points_written = 900;
        store.put_dnode(&dnode).unwrap();

        let stored = store.get_dnode(ip(1)).unwrap().unwrap();
        assert_eq!(stored.vload[2].drop_status, DropStatus::Dropping);
        assert_eq!(stored.vload[2].points_written, 900);
    }

    #[test]
    fn update_dnode_with_mutates_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_dnode(&DnodeInfo::new(ip(1), 2)).unwrap();

        let old = store
            .update_dnode_with(ip(1), |d| std::mem::replace(&mut d.bandwidth_mb, 500))
            .unwrap();
        assert_eq!(old, Some(0));
        assert_eq!(store.get_dnode(ip(1)).unwrap().unwrap().bandwidth_mb, 500);

        assert_eq!(store.update_dnode_with(ip(2), |d| d.bandwidth_mb = 1).unwrap(), None);
        assert!(store.get_dnode(ip(2)).unwrap().is_none());
    }

    #[test]
    fn update_dnode_with_rejects_out_of_range_bandwidth() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_dnode(&DnodeInfo::new(ip(1), 2)).unwrap();

        let result = store.update_dnode_with(ip(1), |d| {
            d.custom_score = 9;
            d.bandwidth_mb = MAX_BANDWIDTH_MB;
        });
        assert!(matches!(result, Err(StateError::Invalid(_))));

        let stored = store.get_dnode(ip(1)).unwrap().unwrap();
        assert_eq!(stored, DnodeInfo::new(ip(1), 2));
    }

    // ── Vgroup lookups ─────────────────────────────────────────────

    #[test]
    fn vgroup_resolves_by_any_gid() {
        let store = StateStore::open_in_memory().unwrap();
        let vg = test_vgroup(3, &[(ip(1), 2), (ip(2), 5)]);
        store.put_vgroup(&vg).unwrap();

        assert_eq!(store.vgroup_by_vnode(ip(1), 2).unwrap(), Some(vg.clone()));
        assert_eq!(store.vgroup_by_vnode(ip(2), 5).unwrap(), Some(vg.clone()));
        assert!(store.vgroup_by_vnode(ip(1), 5).unwrap().is_none());
        assert_eq!(store.get_vgroup(3).unwrap(), Some(vg));
    }

    #[test]
    fn vgroup_update_reindexes_gids() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_vgroup(&test_vgroup(3, &[(ip(1), 2)])).unwrap();
        store.put_vgroup(&test_vgroup(3, &[(ip(4), 7)])).unwrap();

        assert!(store.vgroup_by_vnode(ip(1), 2).unwrap().is_none());
        assert_eq!(store.vgroup_by_vnode(ip(4), 7).unwrap().unwrap().vg_id, 3);
    }

    #[test]
    fn vgroup_delete_clears_index() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_vgroup(&test_vgroup(9, &[(ip(1), 1)])).unwrap();

        assert!(store.delete_vgroup(9).unwrap());
        assert!(!store.delete_vgroup(9).unwrap());
        assert!(store.vgroup_by_vnode(ip(1), 1).unwrap().is_none());
    }

    #[test]
    fn deleting_old_vgroup_keeps_new_owner_of_gid() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_vgroup(&test_vgroup(1, &[(ip(5), 2)])).unwrap();
        store.put_vgroup(&test_vgroup(2, &[(ip(5), 2)])).unwrap();

        assert!(store.delete_vgroup(1).unwrap());
        assert_eq!(store.vgroup_by_vnode(ip(5), 2).unwrap().unwrap().vg_id, 2);
    }

    #[test]
    fn updating_old_vgroup_keeps_new_owner_of_gid() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_vgroup(&test_vgroup(1, &[(ip(5), 2)])).unwrap();
        store.put_vgroup(&test_vgroup(2, &[(ip(5), 2)])).unwrap();
        store.put_vgroup(&test_vgroup(1, &[(ip(5), 3)])).unwrap();

        assert_eq!(store.vgroup_by_vnode(ip(5), 2).unwrap().unwrap().vg_id, 2);
        assert_eq!(store.vgroup_by_vnode(ip(5), 3).unwrap().unwrap().vg_id, 1);
    }

    // ── Databases ──────────────────────────────────────────────────

    #[test]
    fn database_put_get_delete() {
        let store = StateStore::open_in_memory().unwrap();
        let db = DbInfo {
            name: "metrics".to_string(),
            replications: 1,
            created_at: 1000,
        };
        store.put_database(&db).unwrap();
        assert_eq!(store.get_database("metrics").unwrap(), Some(db));
        assert!(store.delete_database("metrics").unwrap());
        assert!(store.get_database("metrics").unwrap().is_none());
    }

    // ── Table lookups ──────────────────────────────────────────────

    #[test]
    fn table_resolves_by_location() {
        let store = StateStore::open_in_memory().unwrap();
        let t1 = test_table("t1", ip(5), 2, 7);
        store.put_table(&t1).unwrap();

        assert_eq!(store.table_by_location(ip(5), 2, 7).unwrap(), Some(t1));
        assert!(store.table_by_location(ip(5), 2, 99).unwrap().is_none());
    }

    #[test]
    fn moved_table_leaves_no_stale_location() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_table(&test_table("t1", ip(5), 2, 7)).unwrap();
        store.put_table(&test_table("t1", ip(6), 1, 3)).unwrap();

        assert!(store.table_by_location(ip(5), 2, 7).unwrap().is_none());
        assert_eq!(
            store.table_by_location(ip(6), 1, 3).unwrap().unwrap().table_id,
            "t1"
        );
    }

    #[test]
    fn table_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_table(&test_table("t1", ip(5), 2, 7)).unwrap();

        assert!(store.delete_table("t1").unwrap());
        assert!(!store.delete_table("t1").unwrap());
        assert!(store.table_by_location(ip(5), 2, 7).unwrap().is_none());
    }

    #[test]
    fn deleting_old_table_keeps_new_occupant_of_slot() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_table(&test_table("t1", ip(5), 2, 7)).unwrap();
        store.put_table(&test_table("t2", ip(5), 2, 7)).unwrap();

        assert!(store.delete_table("t1").unwrap());
        assert_eq!(
            store.table_by_location(ip(5), 2, 7).unwrap().unwrap().table_id,
            "t2"
        );
    }

    #[test]
    fn moving_old_table_keeps_new_occupant_of_slot() {
        let store = StateStore::open_in_memory().unwrap();
        store.put_table(&test_table("t1", ip(5), 2, 7)).unwrap();
        store.put_table(&test_table("t2", ip(5), 2, 7)).unwrap();
        store.put_table(&test_table("t1", ip(6), 1, 3)).unwrap();

        assert_eq!(
            store.table_by_location(ip(5), 2, 7).unwrap().unwrap().table_id,
            "t2"
        );
        assert_eq!(
            store.table_by_location(ip(6), 1, 3).unwrap().unwrap().table_id,
            "t1"
        );
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("meta.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.put_dnode(&DnodeInfo::new(ip(9), 2)).unwrap();
            store.put_table(&test_table("t1", ip(9), 0, 1)).unwrap();
        }

        let store = StateStore::open(&db_path).unwrap();
        assert!(store.get_dnode(ip(9)).unwrap().is_some());
        assert!(store.table_by_location(ip(9), 0, 1).unwrap().is_some());
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_dnodes().unwrap().is_empty());
        assert!(store.get_vgroup(1).unwrap().is_none());
        assert!(store.get_database("none").unwrap().is_none());
        assert!(!store.delete_table("none").unwrap());
    }
}
