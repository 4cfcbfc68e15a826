//! JSON-document node store.
//!
//! The whole store lives in one JSON file (`{"nodes": ..., "ids": ...}`)
//! which is rewritten after every mutating call. Writes go to a sibling
//! `.tmp` file that is renamed over the target, so a crash mid-write leaves
//! the previous document intact.
//!
//! A mutation is staged on a copy of the state and only becomes visible once
//! its document is on disk. A failed write leaves nodes and allocator as
//! they were.

use super::{MemoryStore, NodeStore};
use crate::formats::{StoreDocument, document_from_bytes, document_to_bytes};
use crate::identifier::IdAllocator;
use crate::{GraphError, Node, NodeId};
use std::path::{Path, PathBuf};

/// Node store persisted as a single JSON document.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: MemoryStore,
}

impl FileStore {
    /// Open the document at `path`, creating an empty one if it is missing.
    ///
    /// An existing document keeps its persisted allocator state. `ids` is
    /// used for a fresh document and is what `clear` resets to.
    pub fn open(path: impl AsRef<Path>, ids: IdAllocator) -> Result<Self, GraphError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            let store = Self {
                state: MemoryStore::new(ids),
                path,
            };
            store.save()?;
            tracing::debug!(path = %store.path.display(), "created empty store document");
            return Ok(store);
        }

        let bytes = std::fs::read(&path)
            .map_err(|e| GraphError::IoError(format!("read {}: {}", path.display(), e)))?;
        let document = document_from_bytes(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            nodes = document.nodes.len(),
            "loaded store document"
        );
        Ok(Self {
            path,
            state: MemoryStore::from_document(document, ids),
        })
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The in-memory document mirrored to disk.
    #[must_use]
    pub fn document(&self) -> &StoreDocument {
        self.state.document()
    }

    /// Rewrite the backing file with the current state.
    pub fn save(&self) -> Result<(), GraphError> {
        write_document(&self.path, self.state.document())
    }

    /// Run `change` on a copy of the state, persist the copy, then adopt it.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryStore) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let mut staged = self.state.clone();
        let out = change(&mut staged)?;
        write_document(&self.path, staged.document())?;
        self.state = staged;
        Ok(out)
    }
}

fn write_document(path: &Path, document: &StoreDocument) -> Result<(), GraphError> {
    let bytes = document_to_bytes(document)?;
    let mut tmp = path.to_path_buf().into_os_string();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, &bytes)
        .map_err(|e| GraphError::IoError(format!("write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| GraphError::IoError(format!("rename {}: {}", path.display(), e)))?;
    Ok(())
}

impl NodeStore for FileStore {
    fn allocator(&self) -> &IdAllocator {
        self.state.allocator()
    }

    fn get(&self, id: &NodeId) -> Result<Option<Node>, GraphError> {
        self.state.get(id)
    }

    fn all(&self) -> Result<Vec<Node>, GraphError> {
        self.state.all()
    }

    fn insert(&mut self, node: Node) -> Result<NodeId, GraphError> {
        self.commit(|state| state.insert(node))
    }

    fn update(&mut self, node: Node) -> Result<(), GraphError> {
        self.commit(|state| state.update(node))
    }

    fn remove(&mut self, id: &NodeId) -> Result<(), GraphError> {
        self.commit(|state| state.remove(id))
    }

    fn clear(&mut self) -> Result<(), GraphError> {
        self.commit(|state| state.clear())
    }

    fn len(&self) -> Result<usize, GraphError> {
        self.state.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn store_contract() {
        let temp = tempdir().expect("temp dir");
        let open = |name: &str| {
            FileStore::open(temp.path().join(name), IdAllocator::token(6)).expect("open")
        };
        contract::insert_assigns_fresh_ids(&mut open("a.json"));
        contract::copies_are_independent(&mut open("b.json"));
        contract::update_replaces_whole_node(&mut open("c.json"));
        contract::insert_rejects_existing_id(&mut open("d.json"));
        contract::remove_and_clear(&mut open("e.json"));
    }

    #[test]
    fn open_missing_file_writes_empty_document() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        let store = FileStore::open(&path, IdAllocator::sequential()).expect("open");
        assert_eq!(store.len().expect("len"), 0);
        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(on_disk, json!({"nodes": {}, "ids": {"last_id": 100}}));
    }

    #[test]
    fn open_under_missing_directory_fails() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("missing").join("db.json");
        let err = FileStore::open(&path, IdAllocator::sequential()).expect_err("no directory");
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }

    #[test]
    fn failed_write_leaves_state_untouched() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        let mut store = FileStore::open(&path, IdAllocator::sequential()).expect("open");
        let kept = store
            .insert(Node::from_value(json!({"name": "kept"})).expect("object"))
            .expect("insert");

        // A directory in the way of the temp file makes every save fail.
        std::fs::create_dir(temp.path().join("db.json.tmp")).expect("block temp file");

        let err = store
            .insert(Node::from_value(json!({"name": "A"})).expect("object"))
            .expect_err("write fails");
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
        assert_eq!(store.len().expect("len"), 1);
        assert_eq!(store.allocator(), &IdAllocator::Sequential { last_id: 101 });

        assert!(store.remove(&kept).is_err());
        assert!(store.contains(&kept).expect("contains"));
        assert!(store.clear().is_err());
        assert_eq!(store.len().expect("len"), 1);

        // Once the obstacle is gone the next write carries only committed state.
        std::fs::remove_dir(temp.path().join("db.json.tmp")).expect("unblock");
        let next = store.insert(Node::new()).expect("insert");
        assert_eq!(next, NodeId::Seq(102));
        let reopened = FileStore::open(&path, IdAllocator::sequential()).expect("reopen");
        assert_eq!(reopened.len().expect("len"), 2);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        let mut store = FileStore::open(&path, IdAllocator::sequential()).expect("open");
        let id = store
            .insert(Node::from_value(json!({"name": "A"})).expect("object"))
            .expect("insert");

        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(
            on_disk,
            json!({"nodes": {"100": {"name": "A", "id": 100}}, "ids": {"last_id": 101}})
        );

        store.remove(&id).expect("remove");
        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(on_disk, json!({"nodes": {}, "ids": {"last_id": 101}}));
    }

    #[test]
    fn reopen_restores_nodes_and_allocator() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        let (a, b) = {
            let mut store = FileStore::open(&path, IdAllocator::sequential()).expect("open");
            let a = store.insert(Node::new()).expect("insert");
            let b = store.insert(Node::new()).expect("insert");
            (a, b)
        };

        let mut store = FileStore::open(&path, IdAllocator::sequential()).expect("reopen");
        assert!(store.contains(&a).expect("contains"));
        assert!(store.contains(&b).expect("contains"));
        let c = store.insert(Node::new()).expect("insert");
        assert_eq!(c, NodeId::Seq(102));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        let mut store = FileStore::open(&path, IdAllocator::token(6)).expect("open");
        store.insert(Node::new()).expect("insert");
        assert!(!temp.path().join("db.json.tmp").exists());
    }

    #[test]
    fn corrupt_document_is_a_storage_error() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("db.json");
        std::fs::write(&path, b"{broken").expect("write");
        let err = FileStore::open(&path, IdAllocator::token(6)).expect_err("corrupt");
        assert_eq!(err.kind(), crate::ErrorKind::Storage);
    }
}
