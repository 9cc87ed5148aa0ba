//! vgrid-state: coordinator metadata store.
//!
//! Backed by [redb](https://docs.rs/redb), holds the authoritative records
//! the coordinator reasons about: worker dnodes (with their per-vnode load
//! tables), vgroups, databases, and table placements.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns.
//! Two secondary tables index placements by location so the coordinator can
//! answer "which table lives at (dnode, vnode, sid)" and "which vgroup owns
//! (dnode, vnode)" without scanning.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`).
//! Every write is its own transaction. Read-modify-write of a dnode goes
//! through [`StateStore::update_dnode_with`], which holds one write
//! transaction across the read, the change and the write. Index entries are
//! only removed while they still name the record being changed.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
