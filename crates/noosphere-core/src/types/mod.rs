//! # Core Type Definitions
//!
//! This module contains the core types of the Noosphere flat graph:
//! - Node identifiers (`NodeId`) and the reserved Root Loader id
//! - Nodes (`Node`) and reference values (`{"id": ...}`)
//! - Value classification (`ValueKind`, `ScalarKind`)
//! - Error types (`GraphError`, `ErrorKind`)
//!
//! ## Flat Structure
//!
//! A node is a flat mapping of attribute keys to values. A value is either a
//! scalar (null, bool, int, float, string), a reference to another node, or a
//! homogeneous array of one of those. References are one-way edges.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Reserved attribute key holding a node's identifier.
pub const ID_KEY: &str = "id";

/// Identifier of the Root Loader node anchoring module discovery.
pub const ROOT_LOADER_ID: &str = "!0";

// =============================================================================
// NODE IDENTIFIERS
// =============================================================================

/// Identifier of a node in the graph.
///
/// Sequential allocation produces integers, token allocation produces
/// `!`-prefixed alphanumeric strings. Serialized untagged, so an id is a plain
/// JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeId {
    /// Integer id from the sequential allocator.
    Seq(u64),
    /// String id from the token allocator (or the Root Loader `!0`).
    Token(String),
}

impl NodeId {
    /// The Root Loader identifier `!0`.
    #[must_use]
    pub fn root() -> Self {
        Self::Token(ROOT_LOADER_ID.to_string())
    }

    /// Build a token id from a string.
    #[must_use]
    pub fn token(s: impl Into<String>) -> Self {
        Self::Token(s.into())
    }

    /// Whether this is the Root Loader identifier.
    #[must_use]
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Token(t) if t == ROOT_LOADER_ID)
    }

    /// The string form used as a store key and as an attribute key.
    #[must_use]
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// The JSON value stored under `id`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Seq(n) => Value::from(*n),
            Self::Token(t) => Value::String(t.clone()),
        }
    }

    /// Read an id from its JSON value. Does not apply allocator rules.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(Self::Seq),
            Value::String(s) => Some(Self::Token(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seq(n) => write!(f, "{n}"),
            Self::Token(t) => f.write_str(t),
        }
    }
}

impl From<u64> for NodeId {
    fn from(n: u64) -> Self {
        Self::Seq(n)
    }
}

// =============================================================================
// REFERENCES
// =============================================================================

/// Build the reference value `{"id": <id>}`.
#[must_use]
pub fn reference(id: &NodeId) -> Value {
    let mut map = Map::new();
    map.insert(ID_KEY.to_string(), id.to_value());
    Value::Object(map)
}

/// Build an array of references.
#[must_use]
pub fn references<'a>(ids: impl IntoIterator<Item = &'a NodeId>) -> Value {
    Value::Array(ids.into_iter().map(reference).collect())
}

/// The id a reference value points at, if the value is a well-formed reference.
#[must_use]
pub fn referenced_id(value: &Value) -> Option<NodeId> {
    value
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.get(ID_KEY))
        .and_then(NodeId::from_value)
}

// =============================================================================
// NODE
// =============================================================================

/// A flat entity record: attribute key -> value, including `id` once stored.
///
/// Key order is preserved. Equality ignores key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Node(Map<String, Value>);

impl Node {
    /// Create an empty node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a node from a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(GraphError::Structural(format!(
                "a node must be a JSON object, got {other}"
            ))),
        }
    }

    /// The node's identifier, if it has been stored.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.0.get(ID_KEY).and_then(NodeId::from_value)
    }

    /// Whether the node carries an `id` key at all.
    #[must_use]
    pub fn has_id(&self) -> bool {
        self.0.contains_key(ID_KEY)
    }

    pub(crate) fn set_id(&mut self, id: &NodeId) {
        self.0.insert(ID_KEY.to_string(), id.to_value());
    }

    /// A reference value pointing at this node.
    #[must_use]
    pub fn reference(&self) -> Option<Value> {
        self.id().map(|id| reference(&id))
    }

    /// Whether this node is the Root Loader.
    #[must_use]
    pub fn is_root_loader(&self) -> bool {
        self.id().is_some_and(|id| id.is_root())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Set an attribute, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Attribute keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Node {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Node {
    type Error = GraphError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

// =============================================================================
// VALUE CLASSIFICATION
// =============================================================================

/// Declared element kind of an attribute (the `dbtype` tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Str,
    Int,
    Float,
    Bool,
    Ref,
}

impl ScalarKind {
    /// All valid `dbtype` tags.
    pub const ALL: [Self; 5] = [Self::Str, Self::Int, Self::Float, Self::Bool, Self::Ref];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Ref => "ref",
        }
    }

    /// Parse a `dbtype` tag.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observed kind of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    None,
    Arr,
    Str,
    Bool,
    Int,
    Float,
    Ref,
}

impl ValueKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Arr => "arr",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Ref => "ref",
        }
    }
}

impl From<ScalarKind> for ValueKind {
    fn from(kind: ScalarKind) -> Self {
        match kind {
            ScalarKind::Str => Self::Str,
            ScalarKind::Int => Self::Int,
            ScalarKind::Float => Self::Float,
            ScalarKind::Bool => Self::Bool,
            ScalarKind::Ref => Self::Ref,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Broad error classes surfaced to callers of the graph engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed value shape.
    Structural,
    /// Declared and observed kind or array-ness disagree.
    TypeMismatch,
    /// Unresolved id, node, or module.
    Lookup,
    /// Identifier allocation collided with existing data.
    Allocation,
    /// Backing storage failed.
    Storage,
}

/// Errors that can occur in the Noosphere graph engine.
///
/// - No silent failures
/// - Nothing is retried internally; errors reach the immediate caller
#[derive(Debug, Error)]
pub enum GraphError {
    /// A value or node has a malformed shape.
    #[error("Structural error: {0}")]
    Structural(String),

    /// A value disagrees with its attribute's declared kind or array-ness.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// The requested node does not exist.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The value is neither an identifier nor a node carrying one.
    #[error("Not an identifier or a node with an id: {0}")]
    NotAnId(String),

    /// A required module is not registered.
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// The Root Loader `!0` is absent or malformed.
    #[error("Root loader is not initialized")]
    RootLoaderMissing,

    /// The sequential allocator's next id is already taken.
    #[error("Identifier {0} is already in use")]
    Allocation(NodeId),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl GraphError {
    /// The taxonomy class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Structural(_) => ErrorKind::Structural,
            Self::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Self::NodeNotFound(_)
            | Self::NotAnId(_)
            | Self::ModuleNotFound(_)
            | Self::RootLoaderMissing => ErrorKind::Lookup,
            Self::Allocation(_) => ErrorKind::Allocation,
            Self::SerializationError(_) | Self::IoError(_) => ErrorKind::Storage,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_id_json_forms() {
        assert_eq!(NodeId::Seq(101).to_value(), json!(101));
        assert_eq!(NodeId::token("!abc123").to_value(), json!("!abc123"));
        assert_eq!(NodeId::from_value(&json!(7)), Some(NodeId::Seq(7)));
        assert_eq!(NodeId::from_value(&json!(1.5)), None);
        assert_eq!(NodeId::Seq(101).key(), "101");
    }

    #[test]
    fn root_id_is_recognized() {
        assert!(NodeId::root().is_root());
        assert!(!NodeId::token("!00").is_root());
        assert!(!NodeId::Seq(0).is_root());
    }

    #[test]
    fn reference_shape() {
        let id = NodeId::token("!k2j4h5");
        let r = reference(&id);
        assert_eq!(r, json!({"id": "!k2j4h5"}));
        assert_eq!(referenced_id(&r), Some(id));
        assert_eq!(referenced_id(&json!({"id": 1, "extra": true})), None);
        assert_eq!(referenced_id(&json!({})), None);
    }

    #[test]
    fn node_rejects_non_objects() {
        let err = Node::from_value(json!([1, 2])).expect_err("array is not a node");
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn node_equality_ignores_key_order() {
        let a = Node::from_value(json!({"a": 1, "b": 2})).expect("object");
        let b = Node::from_value(json!({"b": 2, "a": 1})).expect("object");
        assert_eq!(a, b);
    }

    #[test]
    fn scalar_kind_tags() {
        for kind in ScalarKind::ALL {
            assert_eq!(ScalarKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ScalarKind::parse("relation"), None);
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            GraphError::NodeNotFound(NodeId::Seq(1)).kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            GraphError::ModuleNotFound("link".into()).kind(),
            ErrorKind::Lookup
        );
        assert_eq!(
            GraphError::Allocation(NodeId::Seq(100)).kind(),
            ErrorKind::Allocation
        );
    }
}
