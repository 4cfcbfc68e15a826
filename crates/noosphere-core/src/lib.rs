//! # noosphere-core
//!
//! The self-describing flat-graph engine for Noosphere.
//!
//! A graph is a flat collection of JSON-like nodes keyed by identifier.
//! Nodes point at each other through references (`{"id": <id>}`), and the
//! schema itself lives in the graph as ordinary nodes:
//!
//! - the Root Loader `!0` lists every module descriptor
//! - the `loader` module names the attributes a descriptor carries
//! - `attribute_id` declares element kind and array-ness per attribute
//! - `link` pairs attributes so references are mirrored automatically
//! - `type` adds type-defining nodes
//!
//! ## Architectural Constraints
//!
//! - Synchronous: every write is validate, persist, reconcile
//! - No network dependencies (pure Rust)
//! - Closed: queries are structured predicates, never executable code

// =============================================================================
// MODULES
// =============================================================================

pub mod bootstrap;
pub mod config;
pub mod formats;
pub mod graph;
pub mod identifier;
pub mod integrity;
pub mod link;
pub mod primitives;
pub mod query;
pub mod registry;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ErrorKind, GraphError, ID_KEY, Node, NodeId, ROOT_LOADER_ID, ScalarKind, ValueKind, reference,
    referenced_id, references,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use bootstrap::{
    install_attribute_id_module, install_link_module, install_standard_modules,
    install_type_module, link_attributes, new_attr, new_module, new_type,
};
pub use config::{GraphConfig, IdStrategy};
pub use graph::{Entry, Graph};
pub use identifier::IdAllocator;
pub use integrity::{IntegrityValidator, classify, valid_attribute};
pub use link::{ReferenceSynchronizer, ScalarMirrorPolicy, SyncPlan};
pub use query::{CompareOp, Predicate};
pub use registry::{AttributeKeys, LoaderKeys, Module, ModuleRegistry, Schema};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

pub use store::{FileStore, MemoryStore, NodeStore, RedbStore, StorageBackend};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{StoreDocument, document_from_bytes, document_to_bytes};
