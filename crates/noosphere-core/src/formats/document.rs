//! # Store Document
//!
//! The persisted document has exactly two top-level fields:
//! - `nodes`: node id (as a string key) -> node object
//! - `ids`: allocator state, `{"last_id": n}` or `{"ids_len": n}`
//!
//! ## Validation
//!
//! The size limit is checked before parsing, and every node must carry the
//! id it is keyed under.

use crate::identifier::IdAllocator;
use crate::primitives::MAX_DOCUMENT_SIZE;
use crate::{GraphError, Node};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The whole persisted state of a node store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Node storage keyed by the string form of each node's id.
    pub nodes: BTreeMap<String, Node>,
    /// Allocator state, reloaded verbatim.
    pub ids: IdAllocator,
}

impl StoreDocument {
    /// An empty document with the given allocator state.
    #[must_use]
    pub fn new(ids: IdAllocator) -> Self {
        Self {
            nodes: BTreeMap::new(),
            ids,
        }
    }
}

/// Serialize a document to pretty-printed JSON bytes.
///
/// This is a pure transformation - no file I/O.
pub fn document_to_bytes(document: &StoreDocument) -> Result<Vec<u8>, GraphError> {
    serde_json::to_vec_pretty(document).map_err(|e| GraphError::SerializationError(e.to_string()))
}

/// Deserialize a document from JSON bytes.
///
/// This is a pure transformation - no file I/O.
pub fn document_from_bytes(bytes: &[u8]) -> Result<StoreDocument, GraphError> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(GraphError::SerializationError(format!(
            "Document size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let document: StoreDocument = serde_json::from_slice(bytes).map_err(|e| {
        GraphError::SerializationError(format!("Failed to parse store document: {}", e))
    })?;

    for (key, node) in &document.nodes {
        match node.id() {
            Some(id) if id.key() == *key => {}
            _ => {
                return Err(GraphError::SerializationError(format!(
                    "Node stored under '{}' does not carry that id",
                    key
                )));
            }
        }
    }

    Ok(document)
}

// =============================================================================
// TESTS
// =============================================================================
