//! redb table definitions for the metadata store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized records).
//! Location keys follow the pattern `{ip}:{vnode}` or `{ip}:{vnode}:{sid}`.

use redb::TableDefinition;

/// Shape shared by every table: string key, JSON value.
pub type JsonTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Worker dnodes keyed by private IP.
pub const DNODES: JsonTable = TableDefinition::new("dnodes");

/// Vgroups keyed by decimal vgroup id.
pub const VGROUPS: JsonTable = TableDefinition::new("vgroups");

/// Vgroup id keyed by `{ip}:{vnode}` for every vnode gid of every vgroup.
pub const VNODE_OWNERS: JsonTable = TableDefinition::new("vnode_owners");

/// Databases keyed by name.
pub const DATABASES: JsonTable = TableDefinition::new("databases");

/// Tables keyed by table id.
pub const TABLES: JsonTable = TableDefinition::new("tables");

/// Table id keyed by `{ip}:{vnode}:{sid}`.
pub const TABLE_LOCATIONS: JsonTable = TableDefinition::new("table_locations");
