//! # redb-backed Node Store
//!
//! A disk-backed node store using the redb embedded database.
//!
//! Nodes are stored as JSON bytes keyed by the string form of their id, so
//! iteration order matches the in-memory store. The allocator state lives
//! in the metadata table under `ids`, in the same JSON shape as the `ids`
//! block of a store document.
//!
//! Each mutating call runs in its own write transaction.

use super::{NodeStore, require_id, require_no_id};
use crate::identifier::IdAllocator;
use crate::{GraphError, Node, NodeId};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for nodes: id key -> serialized node JSON
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Table for metadata: key string -> serialized JSON
const METADATA: TableDefinition<&str, &[u8]> = TableDefinition::new("metadata");

/// Metadata key holding the allocator state.
const IDS_KEY: &str = "ids";

fn io_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::IoError(e.to_string())
}

fn ser_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::SerializationError(e.to_string())
}

/// A disk-backed node store using redb.
pub struct RedbStore {
    /// The redb database handle.
    db: Database,
    /// Cached allocator state, written through on every allocation.
    ids: IdAllocator,
    /// Allocator state restored by `clear`.
    initial: IdAllocator,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a node database at the given path.
    ///
    /// A fresh database records `ids` as its allocator state. An existing
    /// one keeps whatever state it persisted.
    pub fn open(path: impl AsRef<Path>, ids: IdAllocator) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let persisted = {
            let read_txn = db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            match table.get(IDS_KEY).map_err(io_err)? {
                Some(bytes) => Some(
                    serde_json::from_slice::<IdAllocator>(bytes.value()).map_err(ser_err)?,
                ),
                None => None,
            }
        };

        let mut store = Self {
            db,
            ids: persisted.clone().unwrap_or_else(|| ids.clone()),
            initial: ids,
        };
        if persisted.is_none() {
            store.write_ids()?;
        }
        tracing::debug!(path = %path.as_ref().display(), ids = ?store.ids, "opened redb store");
        Ok(store)
    }

    /// Compact the database (optional optimization).
    pub fn compact(&mut self) -> Result<(), GraphError> {
        self.db.compact().map_err(io_err)?;
        Ok(())
    }

    fn write_ids(&mut self) -> Result<(), GraphError> {
        let bytes = serde_json::to_vec(&self.ids).map_err(ser_err)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(IDS_KEY, bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Node, GraphError> {
        serde_json::from_slice(bytes).map_err(ser_err)
    }
}

// =============================================================================
// NODESTORE TRAIT IMPLEMENTATION
// =============================================================================

impl NodeStore for RedbStore {
    fn allocator(&self) -> &IdAllocator {
        &self.ids
    }

    fn get(&self, id: &NodeId) -> Result<Option<Node>, GraphError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;
        let key = id.key();
        match table.get(key.as_str()).map_err(io_err)? {
            Some(bytes) => Ok(Some(Self::decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn all(&self) -> Result<Vec<Node>, GraphError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;

        let mut nodes = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            nodes.push(Self::decode(value.value())?);
        }
        Ok(nodes)
    }

    fn insert(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        require_no_id(&node)?;

        let mut ids = self.ids.clone();
        let write_txn = self.db.begin_write().map_err(io_err)?;
        let id = {
            let mut nodes = write_txn.open_table(NODES).map_err(io_err)?;
            let id = ids.new_id(|candidate| {
                let key = candidate.key();
                Ok(nodes.get(key.as_str()).map_err(io_err)?.is_some())
            })?;
            node.set_id(&id);
            let bytes = serde_json::to_vec(&node).map_err(ser_err)?;
            let key = id.key();
            nodes.insert(key.as_str(), bytes.as_slice()).map_err(io_err)?;
            id
        };
        {
            let ids_bytes = serde_json::to_vec(&ids).map_err(ser_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(IDS_KEY, ids_bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;

        // The cached allocator only advances once the transaction is durable.
        self.ids = ids;
        Ok(id)
    }

    fn update(&mut self, node: Node) -> Result<(), GraphError> {
        let id = require_id(&node)?;
        if !self.ids.accepts(&id) {
            return Err(GraphError::NotAnId(id.key()));
        }
        let bytes = serde_json::to_vec(&node).map_err(ser_err)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(io_err)?;
            let key = id.key();
            nodes.insert(key.as_str(), bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn remove(&mut self, id: &NodeId) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(io_err)?;
            let key = id.key();
            nodes.remove(key.as_str()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), GraphError> {
        let ids_bytes = serde_json::to_vec(&self.initial).map_err(ser_err)?;
        let write_txn = self.db.begin_write().map_err(io_err)?;
        write_txn.delete_table(NODES).map_err(io_err)?;
        {
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(IDS_KEY, ids_bytes.as_slice()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        self.ids = self.initial.clone();
        Ok(())
    }

    fn len(&self) -> Result<usize, GraphError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(NODES).map_err(io_err)?;
        let count = table.len().map_err(io_err)?;
        Ok(count as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================
