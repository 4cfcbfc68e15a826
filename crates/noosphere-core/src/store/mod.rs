//! # Node Store
//!
//! Keyed collection of nodes with copy-in/copy-out semantics.
//!
//! Every node handed to a store is moved in, and every node handed out is a
//! fresh clone, so callers can never alias stored state.
//!
//! ## Backends
//!
//! - `MemoryStore`: ephemeral, no external effect
//! - `FileStore`: rewrites one JSON document on every mutating call
//! - `RedbStore`: redb database, one write transaction per mutating call
//!
//! `StorageBackend` selects one of them at runtime.

mod file;
mod memory;
mod redb_store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::identifier::IdAllocator;
use crate::{GraphError, Node, NodeId};

// =============================================================================
// NODESTORE TRAIT
// =============================================================================

/// The NodeStore trait defines the persistence operations of the graph.
///
/// All fallible operations return `Result<T, GraphError>` so in-memory and
/// durable backends are interchangeable.
pub trait NodeStore {
    /// The allocator deciding what counts as an identifier.
    fn allocator(&self) -> &IdAllocator;

    /// Fetch a copy of a node.
    fn get(&self, id: &NodeId) -> Result<Option<Node>, GraphError>;

    /// Copies of all nodes in store-iteration order.
    fn all(&self) -> Result<Vec<Node>, GraphError>;

    /// Store a node that carries no `id`, assigning a fresh one.
    fn insert(&mut self, node: Node) -> Result<NodeId, GraphError>;

    /// Store a node under the `id` it carries, replacing any previous state.
    fn update(&mut self, node: Node) -> Result<(), GraphError>;

    /// Delete a node. Removing an absent id is a no-op.
    fn remove(&mut self, id: &NodeId) -> Result<(), GraphError>;

    /// Wipe all nodes and reset the allocator to its configured state.
    fn clear(&mut self) -> Result<(), GraphError>;

    /// Check whether a node exists.
    fn contains(&self, id: &NodeId) -> Result<bool, GraphError> {
        Ok(self.get(id)?.is_some())
    }

    /// Get the total number of nodes.
    fn len(&self) -> Result<usize, GraphError> {
        Ok(self.all()?.len())
    }
}

/// Ids carried by nodes entering a store must be present for `update` and
/// absent for `insert`.
pub(crate) fn require_id(node: &Node) -> Result<NodeId, GraphError> {
    node.id()
        .ok_or_else(|| GraphError::NotAnId(format!("node carries no valid id: {node}")))
}

pub(crate) fn require_no_id(node: &Node) -> Result<(), GraphError> {
    if node.has_id() {
        return Err(GraphError::Structural(format!(
            "node already carries an id: {node}"
        )));
    }
    Ok(())
}

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend chosen at runtime.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    Memory(MemoryStore),
    /// JSON document file, rewritten on every mutation.
    File(FileStore),
    /// Disk-backed store using redb.
    Redb(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::Memory(MemoryStore::default())
    }
}

impl StorageBackend {
    /// Check if using durable storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        !matches!(self, Self::Memory(_))
    }
}

impl NodeStore for StorageBackend {
    fn allocator(&self) -> &IdAllocator {
        match self {
            Self::Memory(store) => store.allocator(),
            Self::File(store) => store.allocator(),
            Self::Redb(store) => store.allocator(),
        }
    }

    fn get(&self, id: &NodeId) -> Result<Option<Node>, GraphError> {
        match self {
            Self::Memory(store) => store.get(id),
            Self::File(store) => store.get(id),
            Self::Redb(store) => store.get(id),
        }
    }

    fn all(&self) -> Result<Vec<Node>, GraphError> {
        match self {
            Self::Memory(store) => store.all(),
            Self::File(store) => store.all(),
            Self::Redb(store) => store.all(),
        }
    }

    fn insert(&mut self, node: Node) -> Result<NodeId, GraphError> {
        match self {
            Self::Memory(store) => store.insert(node),
            Self::File(store) => store.insert(node),
            Self::Redb(store) => store.insert(node),
        }
    }

    fn update(&mut self, node: Node) -> Result<(), GraphError> {
        match self {
            Self::Memory(store) => store.update(node),
            Self::File(store) => store.update(node),
            Self::Redb(store) => store.update(node),
        }
    }

    fn remove(&mut self, id: &NodeId) -> Result<(), GraphError> {
        match self {
            Self::Memory(store) => store.remove(id),
            Self::File(store) => store.remove(id),
            Self::Redb(store) => store.remove(id),
        }
    }

    fn clear(&mut self) -> Result<(), GraphError> {
        match self {
            Self::Memory(store) => store.clear(),
            Self::File(store) => store.clear(),
            Self::Redb(store) => store.clear(),
        }
    }

    fn len(&self) -> Result<usize, GraphError> {
        match self {
            Self::Memory(store) => store.len(),
            Self::File(store) => store.len(),
            Self::Redb(store) => store.len(),
        }
    }
}

// =============================================================================
// CONTRACT TESTS (shared by every backend)
// =============================================================================

#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn node(value: serde_json::Value) -> Node {
        Node::from_value(value).expect("object")
    }

    pub(crate) fn insert_assigns_fresh_ids(store: &mut impl NodeStore) {
        let a = store.insert(node(json!({"name": "a"}))).expect("insert");
        let b = store.insert(node(json!({"name": "b"}))).expect("insert");
        assert_ne!(a, b);
        assert!(store.allocator().accepts(&a));
        assert_eq!(store.len().expect("len"), 2);
    }

    pub(crate) fn copies_are_independent(store: &mut impl NodeStore) {
        let id = store.insert(node(json!({"name": "a"}))).expect("insert");
        let mut copy = store.get(&id).expect("get").expect("present");
        copy.insert("name", "changed");
        let fresh = store.get(&id).expect("get").expect("present");
        assert_eq!(fresh.get("name"), Some(&json!("a")));
        assert_eq!(fresh.id(), Some(id));
    }

    pub(crate) fn update_replaces_whole_node(store: &mut impl NodeStore) {
        let id = store
            .insert(node(json!({"name": "a", "extra": 1})))
            .expect("insert");
        let mut replacement = node(json!({"title": "a"}));
        replacement.set_id(&id);
        store.update(replacement).expect("update");
        let stored = store.get(&id).expect("get").expect("present");
        assert!(stored.contains_key("title"));
        assert!(!stored.contains_key("extra"));
    }

    pub(crate) fn insert_rejects_existing_id(store: &mut impl NodeStore) {
        let err = store
            .insert(node(json!({"id": "!abcdef", "name": "a"})))
            .expect_err("id present");
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    pub(crate) fn remove_and_clear(store: &mut impl NodeStore) {
        let initial = store.allocator().clone();
        let a = store.insert(node(json!({"n": 1}))).expect("insert");
        let b = store.insert(node(json!({"n": 2}))).expect("insert");
        store.remove(&a).expect("remove");
        assert!(!store.contains(&a).expect("contains"));
        assert!(store.contains(&b).expect("contains"));
        store.clear().expect("clear");
        assert_eq!(store.len().expect("len"), 0);
        assert_eq!(store.allocator(), &initial);
    }
}
