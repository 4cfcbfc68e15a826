//! # Module Registry
//!
//! Discovers the schema modules installed in a graph.
//!
//! The Root Loader `!0` lists module descriptors in its `modules` array.
//! The `loader` descriptor is found by identity: its literal `name` field
//! references an attribute, and the value of that attribute on the same
//! descriptor is `"loader"`. Every descriptor's name is then read through
//! that attribute.
//!
//! Discovery also resolves the [`Schema`]: the attribute keys the validator
//! and the synchronizer need. The schema is a plain value recomputed on every
//! discovery, never global state.

use crate::primitives::{
    ARRAY_FIELD, ATTRIBUTE_ID_MODULE, DBTYPE_FIELD, LINK_MODULE, LOADER_MODULE, MODULES_KEY,
    NAME_FIELD, SCOPE_FIELD, TARGET_FIELD, VERSION_FIELD,
};
use crate::store::NodeStore;
use crate::{GraphError, Node, NodeId, referenced_id};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// MODULE DESCRIPTOR
// =============================================================================

/// A fresh copy of a module descriptor with field accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    node: Node,
}

impl Module {
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self { node }
    }

    /// Id of the descriptor node.
    #[must_use]
    pub fn id(&self) -> Option<NodeId> {
        self.node.id()
    }

    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    #[must_use]
    pub fn into_node(self) -> Node {
        self.node
    }

    /// The raw reference stored under a descriptor field.
    #[must_use]
    pub fn reference(&self, field: &str) -> Option<&Value> {
        self.node.get(field)
    }

    /// The id a descriptor field references.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<NodeId> {
        self.node.get(field).and_then(referenced_id)
    }

    /// The attribute key a descriptor field stands for.
    #[must_use]
    pub fn key(&self, field: &str) -> Option<String> {
        self.get(field).map(|id| id.key())
    }

    /// Like [`Module::key`], failing when the field is absent.
    pub fn require_key(&self, field: &str) -> Result<String, GraphError> {
        self.key(field).ok_or_else(|| {
            GraphError::Structural(format!(
                "module descriptor {} has no '{}' reference",
                self.node, field
            ))
        })
    }
}

// =============================================================================
// SCHEMA CONTEXT
// =============================================================================

/// Attribute keys of the `loader` module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderKeys {
    pub scope: String,
    pub name: String,
    pub version: String,
}

/// Attribute keys of the `attribute_id` module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeKeys {
    pub name: String,
    pub dbtype: String,
    pub array: String,
}

/// Resolved attribute keys of the installed vocabulary modules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    pub loader: Option<LoaderKeys>,
    pub attribute: Option<AttributeKeys>,
    /// The link module's `target` key.
    pub target: Option<String>,
}

impl Schema {
    /// Loader keys, failing when the loader is not resolved.
    pub fn loader(&self) -> Result<&LoaderKeys, GraphError> {
        self.loader.as_ref().ok_or(GraphError::RootLoaderMissing)
    }

    /// Attribute-id keys, failing when the module is not installed.
    pub fn attribute(&self) -> Result<&AttributeKeys, GraphError> {
        self.attribute
            .as_ref()
            .ok_or_else(|| GraphError::ModuleNotFound(ATTRIBUTE_ID_MODULE.to_string()))
    }

    /// The attribute-id keys and the target key, if links are active.
    #[must_use]
    pub fn links(&self) -> Option<(&AttributeKeys, &str)> {
        Some((self.attribute.as_ref()?, self.target.as_deref()?))
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Cached module name -> descriptor id map plus the resolved schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, NodeId>,
    schema: Schema,
}

impl ModuleRegistry {
    /// Read the Root Loader and resolve every listed module.
    ///
    /// A missing Root Loader yields an empty registry. Descriptors that
    /// cannot be fetched or named are skipped with a warning.
    pub fn discover<S: NodeStore + ?Sized>(store: &S) -> Result<Self, GraphError> {
        let Some(root) = store.get(&NodeId::root())? else {
            tracing::debug!("no root loader, registry is empty");
            return Ok(Self::default());
        };
        let Some(Value::Array(entries)) = root.get(MODULES_KEY) else {
            tracing::warn!(root = %root, "root loader has no modules list");
            return Ok(Self::default());
        };

        let mut descriptors = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(id) = referenced_id(entry) else {
                tracing::warn!(entry = %entry, "root loader lists a non-reference");
                continue;
            };
            match store.get(&id)? {
                Some(node) => descriptors.push((id, node)),
                None => tracing::warn!(%id, "root loader lists a missing module"),
            }
        }

        let Some(name_key) = descriptors
            .iter()
            .find_map(|(_, node)| loader_name_key(node))
        else {
            tracing::warn!("root loader lists no loader descriptor");
            return Ok(Self::default());
        };

        let mut modules = BTreeMap::new();
        for (id, node) in &descriptors {
            let Some(name) = node.get(&name_key).and_then(Value::as_str) else {
                tracing::warn!(%id, "module descriptor has no name");
                continue;
            };
            if let Some(previous) = modules.insert(name.to_string(), id.clone()) {
                tracing::warn!(
                    module = name,
                    %previous,
                    replacement = %id,
                    "module name listed twice, the later entry wins"
                );
            }
        }

        let descriptor = |name: &str| {
            modules.get(name).and_then(|id| {
                descriptors
                    .iter()
                    .rev()
                    .find(|(candidate, _)| candidate == id)
                    .map(|(_, node)| Module::new(node.clone()))
            })
        };

        let loader = descriptor(LOADER_MODULE).and_then(|loader| {
            Some(LoaderKeys {
                scope: loader.key(SCOPE_FIELD)?,
                name: loader.key(NAME_FIELD)?,
                version: loader.key(VERSION_FIELD)?,
            })
        });
        let attribute = descriptor(ATTRIBUTE_ID_MODULE).and_then(|module| {
            Some(AttributeKeys {
                name: module.key(NAME_FIELD)?,
                dbtype: module.key(DBTYPE_FIELD)?,
                array: module.key(ARRAY_FIELD)?,
            })
        });
        let target = descriptor(LINK_MODULE).and_then(|module| module.key(TARGET_FIELD));

        tracing::debug!(modules = ?modules.keys().collect::<Vec<_>>(), "discovered modules");
        Ok(Self {
            modules,
            schema: Schema {
                loader,
                attribute,
                target,
            },
        })
    }

    /// Descriptor of a registered module, fetched fresh from the store.
    pub fn module<S: NodeStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
    ) -> Result<Option<Module>, GraphError> {
        match self.modules.get(name) {
            Some(id) => Ok(store.get(id)?.map(Module::new)),
            None => Ok(None),
        }
    }

    /// Like [`ModuleRegistry::module`], failing when the module is absent.
    pub fn require<S: NodeStore + ?Sized>(
        &self,
        store: &S,
        name: &str,
    ) -> Result<Module, GraphError> {
        self.module(store, name)?
            .ok_or_else(|| GraphError::ModuleNotFound(name.to_string()))
    }

    /// Registered module names and their descriptor ids.
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<String, NodeId> {
        &self.modules
    }

    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Whether `id` is the Root Loader or a registered descriptor.
    #[must_use]
    pub fn is_registry_node(&self, id: &NodeId) -> bool {
        id.is_root() || self.modules.values().any(|m| m == id)
    }
}

/// The attribute key naming modules, if `node` is the loader descriptor.
fn loader_name_key(node: &Node) -> Option<String> {
    let key = node.get(NAME_FIELD).and_then(referenced_id)?.key();
    (node.get(&key).and_then(Value::as_str) == Some(LOADER_MODULE)).then_some(key)
}
