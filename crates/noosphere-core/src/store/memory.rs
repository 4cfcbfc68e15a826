//! In-memory node store.

use super::{NodeStore, require_id, require_no_id};
use crate::formats::StoreDocument;
use crate::identifier::IdAllocator;
use crate::primitives::DEFAULT_TOKEN_LENGTH;
use crate::{GraphError, Node, NodeId};

/// Ephemeral store holding the whole document in memory.
///
/// Also serves as the working state of `FileStore`.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryStore {
    document: StoreDocument,
    /// Allocator state restored by `clear`.
    initial: IdAllocator,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(IdAllocator::token(DEFAULT_TOKEN_LENGTH))
    }
}

impl MemoryStore {
    /// Create an empty store with the given allocator.
    #[must_use]
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            document: StoreDocument::new(ids.clone()),
            initial: ids,
        }
    }

    /// Wrap an existing document. `clear` resets to `initial`.
    #[must_use]
    pub fn from_document(document: StoreDocument, initial: IdAllocator) -> Self {
        Self { document, initial }
    }

    /// The current document.
    #[must_use]
    pub fn document(&self) -> &StoreDocument {
        &self.document
    }
}

impl NodeStore for MemoryStore {
    fn allocator(&self) -> &IdAllocator {
        &self.document.ids
    }

    fn get(&self, id: &NodeId) -> Result<Option<Node>, GraphError> {
        Ok(self.document.nodes.get(&id.key()).cloned())
    }

    fn all(&self) -> Result<Vec<Node>, GraphError> {
        Ok(self.document.nodes.values().cloned().collect())
    }

    fn insert(&mut self, mut node: Node) -> Result<NodeId, GraphError> {
        require_no_id(&node)?;
        let StoreDocument { nodes, ids } = &mut self.document;
        let id = ids.new_id(|candidate| Ok(nodes.contains_key(&candidate.key())))?;
        node.set_id(&id);
        nodes.insert(id.key(), node);
        Ok(id)
    }

    fn update(&mut self, node: Node) -> Result<(), GraphError> {
        let id = require_id(&node)?;
        if !self.document.ids.accepts(&id) {
            return Err(GraphError::NotAnId(id.key()));
        }
        self.document.nodes.insert(id.key(), node);
        Ok(())
    }

    fn remove(&mut self, id: &NodeId) -> Result<(), GraphError> {
        self.document.nodes.remove(&id.key());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), GraphError> {
        self.document = StoreDocument::new(self.initial.clone());
        Ok(())
    }

    fn len(&self) -> Result<usize, GraphError> {
        Ok(self.document.nodes.len())
    }
}
