//! # Graph Engine
//!
//! CRUD and query façade over a [`NodeStore`].
//!
//! Every write runs the same pipeline:
//! 1. the Integrity Validator approves the new state,
//! 2. the Reference Synchronizer plans mirror updates (reads only),
//! 3. the node and its reconciled peers are persisted.
//!
//! Writes touching the Root Loader or a registered module descriptor rerun
//! module discovery.

use crate::config::GraphConfig;
use crate::integrity::IntegrityValidator;
use crate::link::ReferenceSynchronizer;
use crate::primitives::{
    DEFAULT_SCOPE, DEFAULT_VERSION, LOADER_MODULE, MODULES_KEY, NAME_FIELD, SCOPE_FIELD,
    VERSION_FIELD,
};
use crate::query::Predicate;
use crate::registry::{Module, ModuleRegistry, Schema};
use crate::store::{MemoryStore, NodeStore, StorageBackend};
use crate::{GraphError, ID_KEY, Node, NodeId, reference};
use serde_json::Value;
use std::collections::BTreeMap;

// =============================================================================
// ENTRY
// =============================================================================

/// Anything that names a node: an id, a node carrying an id, or a JSON value
/// (a bare id or a reference).
#[derive(Debug, Clone, Copy)]
pub enum Entry<'a> {
    Id(&'a NodeId),
    Node(&'a Node),
    Value(&'a Value),
}

impl<'a> From<&'a NodeId> for Entry<'a> {
    fn from(id: &'a NodeId) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a Node> for Entry<'a> {
    fn from(node: &'a Node) -> Self {
        Self::Node(node)
    }
}

impl<'a> From<&'a Value> for Entry<'a> {
    fn from(value: &'a Value) -> Self {
        Self::Value(value)
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The graph engine: a node store plus its discovered modules.
#[derive(Debug)]
pub struct Graph<S = StorageBackend> {
    store: S,
    registry: ModuleRegistry,
    config: GraphConfig,
}

impl Graph<MemoryStore> {
    /// A fresh in-memory graph holding only the Root Loader and `loader`.
    pub fn in_memory(config: GraphConfig) -> Result<Self, GraphError> {
        Self::open(MemoryStore::new(config.allocator()), config)
    }
}

impl<S: NodeStore> Graph<S> {
    /// Wrap a store and discover its modules.
    ///
    /// An entirely empty store is initialized as by [`Graph::clear`].
    pub fn open(store: S, config: GraphConfig) -> Result<Self, GraphError> {
        let mut graph = Self {
            store,
            registry: ModuleRegistry::default(),
            config,
        };
        if graph.store.len()? == 0 {
            graph.init_loader()?;
        } else {
            graph.registry = ModuleRegistry::discover(&graph.store)?;
            if !graph.registry.modules().contains_key(LOADER_MODULE) {
                tracing::warn!("store has data but no loader module, schema is unavailable");
            }
        }
        Ok(graph)
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Attribute keys of the installed vocabulary.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        self.registry.schema()
    }

    /// Registered module names and descriptor ids.
    #[must_use]
    pub fn modules(&self) -> &BTreeMap<String, NodeId> {
        self.registry.modules()
    }

    /// Whether a JSON value is an identifier under the store's strategy.
    #[must_use]
    pub fn is_id(&self, value: &Value) -> bool {
        self.store.allocator().is_id(value)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Resolve anything naming a node to its id.
    pub fn get_id<'e>(&self, entry: impl Into<Entry<'e>>) -> Result<NodeId, GraphError> {
        let ids = self.store.allocator();
        let candidate = match entry.into() {
            Entry::Id(id) => Some(id.clone()),
            Entry::Node(node) => node.get(ID_KEY).and_then(NodeId::from_value),
            Entry::Value(value) => match value {
                Value::Object(map) => map.get(ID_KEY).and_then(NodeId::from_value),
                other => NodeId::from_value(other),
            },
        };
        match candidate {
            Some(id) if ids.accepts(&id) => Ok(id),
            Some(id) => Err(GraphError::NotAnId(id.key())),
            None => Err(GraphError::NotAnId(
                "value is neither an identifier nor a node with an id".to_string(),
            )),
        }
    }

    /// A copy of the named node.
    pub fn get<'e>(&self, entry: impl Into<Entry<'e>>) -> Result<Node, GraphError> {
        let id = self.get_id(entry)?;
        self.store.get(&id)?.ok_or(GraphError::NodeNotFound(id))
    }

    /// Nodes matching `predicate`, in store-iteration order.
    ///
    /// With `ids`, exactly those nodes are considered and any missing one is
    /// a lookup error. Without a predicate, every candidate matches.
    pub fn find(
        &self,
        predicate: Option<&Predicate>,
        ids: Option<&[NodeId]>,
    ) -> Result<Vec<Node>, GraphError> {
        let candidates = match ids {
            Some(ids) => ids
                .iter()
                .map(|id| self.get(id))
                .collect::<Result<Vec<_>, _>>()?,
            None => self.store.all()?,
        };
        Ok(match predicate {
            Some(predicate) => candidates
                .into_iter()
                .filter(|node| predicate.matches(node))
                .collect(),
            None => candidates,
        })
    }

    /// Descriptor of a registered module.
    pub fn module(&self, name: &str) -> Result<Option<Module>, GraphError> {
        self.registry.module(&self.store, name)
    }

    /// Descriptor of a module that must be registered.
    pub fn require_module(&self, name: &str) -> Result<Module, GraphError> {
        self.registry.require(&self.store, name)
    }

    /// Check a node against the installed schema without writing it.
    pub fn valid_entry(&self, node: &Node) -> Result<(), GraphError> {
        IntegrityValidator::new(&self.store, self.registry.schema()).valid_entry(node)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Store a new node and return its assigned id.
    pub fn insert(&mut self, node: Node) -> Result<NodeId, GraphError> {
        if node.has_id() {
            return Err(GraphError::Structural(format!(
                "cannot insert a node that already carries an id: {node}"
            )));
        }
        self.valid_entry(&node)?;

        let mut new = node.clone();
        let id = self.store.insert(node)?;
        new.set_id(&id);

        let planned = self.synchronizer().plan(None, Some(&new));
        let plan = match planned {
            Ok(plan) => plan,
            Err(e) => {
                if let Err(undo) = self.store.remove(&id) {
                    tracing::warn!(%id, error = %undo, "could not roll back rejected insert");
                }
                return Err(e);
            }
        };
        let touched: Vec<NodeId> = plan.touched().cloned().collect();
        plan.apply(&mut self.store)?;
        self.refresh_if_touched(&touched)?;
        Ok(id)
    }

    /// Replace an existing node with `node` (full replacement, never a merge).
    pub fn update(&mut self, node: Node) -> Result<(), GraphError> {
        let id = self.get_id(&node)?;
        self.valid_entry(&node)?;
        let old = self.get(&id)?;

        let mut plan = self.synchronizer().plan(Some(&old), Some(&node))?;
        let mut touched: Vec<NodeId> = plan.touched().cloned().collect();
        let origin = plan.take(&id).unwrap_or(node);
        self.store.update(origin)?;
        plan.apply(&mut self.store)?;

        touched.push(id);
        self.refresh_if_touched(&touched)
    }

    /// Delete a node, unlinking it from its mirrored peers first.
    pub fn remove<'e>(&mut self, entry: impl Into<Entry<'e>>) -> Result<(), GraphError> {
        let id = self.get_id(entry)?;
        let old = self.get(&id)?;

        let mut plan = self.synchronizer().plan(Some(&old), None)?;
        plan.take(&id);
        let mut touched: Vec<NodeId> = plan.touched().cloned().collect();
        plan.apply(&mut self.store)?;
        self.store.remove(&id)?;

        touched.push(id);
        self.refresh_if_touched(&touched)
    }

    /// Wipe everything and re-establish the Root Loader and `loader` module.
    pub fn clear(&mut self) -> Result<(), GraphError> {
        self.store.clear()?;
        self.init_loader()?;
        tracing::info!("graph cleared");
        Ok(())
    }

    /// Register a module descriptor on the Root Loader.
    ///
    /// A descriptor without an id is inserted first; one with an id must
    /// already exist and is updated.
    pub fn add_module(&mut self, descriptor: Node) -> Result<NodeId, GraphError> {
        self.root_loader()?;

        let id = if descriptor.has_id() {
            let id = self.get_id(&descriptor)?;
            self.update(descriptor)?;
            id
        } else {
            self.insert(descriptor)?
        };

        // Re-read: the descriptor write may have mirrored into the root.
        let mut root = self.root_loader()?;
        if let Some(Value::Array(modules)) = root.get_mut(MODULES_KEY) {
            let entry = reference(&id);
            if !modules.contains(&entry) {
                modules.push(entry);
            }
        }
        self.update(root)?;
        tracing::debug!(%id, modules = ?self.registry.modules().keys().collect::<Vec<_>>(), "module added");
        Ok(id)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    fn root_loader(&self) -> Result<Node, GraphError> {
        self.store
            .get(&NodeId::root())?
            .filter(|root| matches!(root.get(MODULES_KEY), Some(Value::Array(_))))
            .ok_or(GraphError::RootLoaderMissing)
    }

    fn synchronizer(&self) -> ReferenceSynchronizer<'_, S> {
        ReferenceSynchronizer::new(
            &self.store,
            self.registry.schema(),
            self.config.scalar_mirror,
        )
    }

    fn refresh_if_touched(&mut self, touched: &[NodeId]) -> Result<(), GraphError> {
        if touched.iter().any(|id| self.registry.is_registry_node(id)) {
            self.registry = ModuleRegistry::discover(&self.store)?;
        }
        Ok(())
    }

    /// Insert `{"name": <field>}`, one of the loader's own attributes.
    fn insert_loader_attribute(&mut self, field: &str) -> Result<NodeId, GraphError> {
        let mut attribute = Node::new();
        attribute.insert(NAME_FIELD, field);
        self.insert(attribute)
    }

    fn init_loader(&mut self) -> Result<(), GraphError> {
        self.registry = ModuleRegistry::default();

        let scope = self.insert_loader_attribute(SCOPE_FIELD)?;
        let name = self.insert_loader_attribute(NAME_FIELD)?;
        let version = self.insert_loader_attribute(VERSION_FIELD)?;

        let mut loader = Node::new();
        loader.insert(scope.key(), DEFAULT_SCOPE);
        loader.insert(name.key(), LOADER_MODULE);
        loader.insert(version.key(), DEFAULT_VERSION);
        loader.insert(SCOPE_FIELD, reference(&scope));
        loader.insert(NAME_FIELD, reference(&name));
        loader.insert(VERSION_FIELD, reference(&version));
        let loader = self.store.insert(loader)?;

        let mut root = Node::new();
        root.set_id(&NodeId::root());
        root.insert(MODULES_KEY, Value::Array(vec![reference(&loader)]));
        self.store.update(root)?;

        self.registry = ModuleRegistry::discover(&self.store)?;
        tracing::debug!(%loader, "root loader initialized");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn graph() -> Graph<MemoryStore> {
        Graph::in_memory(GraphConfig::sequential()).expect("graph")
    }

    fn node(value: Value) -> Node {
        Node::from_value(value).expect("object")
    }

    #[test]
    fn fresh_graph_has_loader() {
        let graph = graph();
        let loader = graph.require_module("loader").expect("loader");
        assert!(loader.get("scope").is_some());
        assert!(loader.get("name").is_some());
        assert!(loader.get("version").is_some());
        // Three loader attributes, the descriptor, and the Root Loader.
        assert_eq!(graph.store().len().expect("len"), 5);
    }

    #[test]
    fn insert_then_get_adds_id() {
        let mut graph = graph();
        let id = graph.insert(node(json!({"name": "A"}))).expect("insert");
        let stored = graph.get(&id).expect("get");
        let mut expected = node(json!({"name": "A"}));
        expected.set_id(&id);
        assert_eq!(stored, expected);
    }

    #[test]
    fn insert_rejects_existing_id() {
        let mut graph = graph();
        let err = graph
            .insert(node(json!({"id": 500, "name": "A"})))
            .expect_err("id present");
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn rejected_insert_is_not_stored() {
        let mut graph = graph();
        let before = graph.store().len().expect("len");
        assert!(graph.insert(node(json!({"x": [1, "a"]}))).is_err());
        assert!(graph.insert(node(json!({"x": [[]]}))).is_err());
        assert_eq!(graph.store().len().expect("len"), before);
    }

    #[test]
    fn get_id_accepts_many_shapes() {
        let mut graph = graph();
        let id = graph.insert(node(json!({"name": "A"}))).expect("insert");
        let stored = graph.get(&id).expect("get");

        assert_eq!(graph.get_id(&id).expect("id"), id);
        assert_eq!(graph.get_id(&stored).expect("node"), id);
        assert_eq!(graph.get_id(&id.to_value()).expect("value"), id);
        assert_eq!(graph.get_id(&reference(&id)).expect("reference"), id);

        let err = graph.get_id(&json!("nope")).expect_err("not an id");
        assert_eq!(err.kind(), ErrorKind::Lookup);
        let err = graph.get_id(&node(json!({"name": "A"}))).expect_err("no id");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn get_missing_is_a_lookup_error() {
        let graph = graph();
        let err = graph.get(&NodeId::Seq(9999)).expect_err("absent");
        assert!(matches!(err, GraphError::NodeNotFound(NodeId::Seq(9999))));
    }

    #[test]
    fn update_replaces_whole_node() {
        let mut graph = graph();
        let id = graph.insert(node(json!({"a": 1, "b": 2}))).expect("insert");
        let mut replacement = node(json!({"c": 3}));
        replacement.set_id(&id);
        graph.update(replacement).expect("update");
        let stored = graph.get(&id).expect("get");
        assert!(!stored.contains_key("a"));
        assert_eq!(stored.get("c"), Some(&json!(3)));
    }

    #[test]
    fn update_requires_existing_node() {
        let mut graph = graph();
        let err = graph
            .update(node(json!({"id": 4242, "a": 1})))
            .expect_err("absent");
        assert_eq!(err.kind(), ErrorKind::Lookup);
        let err = graph.update(node(json!({"a": 1}))).expect_err("no id");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn remove_deletes() {
        let mut graph = graph();
        let id = graph.insert(node(json!({"name": "A"}))).expect("insert");
        graph.remove(&id).expect("remove");
        assert!(graph.get(&id).is_err());
        assert!(graph.remove(&id).is_err());
    }

    #[test]
    fn find_filters_and_resolves_ids() {
        let mut graph = graph();
        let a = graph.insert(node(json!({"kind": "x"}))).expect("insert");
        let b = graph.insert(node(json!({"kind": "y"}))).expect("insert");

        let xs = graph
            .find(Some(&Predicate::eq("kind", "x")), None)
            .expect("find");
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].id(), Some(a.clone()));

        let both = graph.find(None, Some(&[a, b.clone()])).expect("find");
        assert_eq!(both.len(), 2);

        let err = graph
            .find(None, Some(&[b, NodeId::Seq(9999)]))
            .expect_err("missing id");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn clear_restarts_allocation() {
        let mut graph = graph();
        graph.insert(node(json!({"name": "A"}))).expect("insert");
        graph.clear().expect("clear");
        assert_eq!(graph.store().len().expect("len"), 5);
        let loader = graph.modules().get("loader").cloned().expect("loader");
        // 100..102 are the loader attributes, 103 the descriptor.
        assert_eq!(loader, NodeId::Seq(103));
    }

    #[test]
    fn reopen_discovers_modules() {
        let graph = graph();
        let loader = graph.modules().get("loader").cloned();
        let reopened = Graph::open(graph.into_store(), GraphConfig::sequential()).expect("open");
        assert_eq!(reopened.modules().get("loader").cloned(), loader);
    }

    #[test]
    fn add_module_registers_descriptor() {
        let mut graph = graph();
        let keys = graph.schema().loader().expect("loader keys").clone();
        let mut descriptor = Node::new();
        descriptor.insert(keys.scope, "test");
        descriptor.insert(keys.name, "extra");
        descriptor.insert(keys.version, "1");
        let id = graph.add_module(descriptor).expect("add");

        assert_eq!(graph.modules().get("extra"), Some(&id));
        let root = graph.get(&NodeId::root()).expect("root");
        assert_eq!(
            root.get("modules").and_then(Value::as_array).map(Vec::len),
            Some(2)
        );
    }

    #[test]
    fn removing_root_empties_registry() {
        let mut graph = graph();
        graph.remove(&NodeId::root()).expect("remove root");
        assert!(graph.modules().is_empty());
        let err = graph.add_module(Node::new()).expect_err("no root");
        assert!(matches!(err, GraphError::RootLoaderMissing));
    }
}
