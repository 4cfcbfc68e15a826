//! # Standard Vocabulary
//!
//! Installs the canonical schema modules on top of a graph holding only the
//! Root Loader and `loader`:
//!
//! - `attribute_id`: self-describing `name`, `attrs`, `array`, `dbtype`
//!   attributes, also typing the loader's own attributes
//! - `link`: a self-mirrored `target` attribute, so linking attribute A to B
//!   automatically links B back to A
//! - `type`: the `Type` and `Attr` type-defining nodes
//!
//! Self-referential nodes are built in two phases: insert an empty shell to
//! obtain an id, then update it with content referencing that id.
//!
//! Every installer is idempotent: an already registered module is returned
//! as is.

use crate::graph::Graph;
use crate::primitives::{
    ARRAY_FIELD, ATTR_TYPE_FIELD, ATTRIBUTE_ID_MODULE, ATTRS_FIELD, DBTYPE_FIELD, DEFAULT_SCOPE,
    DEFAULT_VERSION, LINK_MODULE, NAME_FIELD, TARGET_FIELD, TYPE_FIELD, TYPE_MODULE,
    TYPE_TYPE_FIELD,
};
use crate::store::NodeStore;
use crate::{GraphError, Node, NodeId, ScalarKind, reference, references};

/// Descriptor skeleton carrying `scope`, `name`, and `version` under the
/// loader's attribute ids.
pub fn new_module<S: NodeStore>(
    graph: &Graph<S>,
    scope: &str,
    name: &str,
    version: &str,
) -> Result<Node, GraphError> {
    let keys = graph.schema().loader()?;
    let mut descriptor = Node::new();
    descriptor.insert(keys.scope.clone(), scope);
    descriptor.insert(keys.name.clone(), name);
    descriptor.insert(keys.version.clone(), version);
    Ok(descriptor)
}

/// An attribute-defining node, typed as `Attr` when the type module is
/// installed. Not inserted.
pub fn new_attr<S: NodeStore>(
    graph: &Graph<S>,
    name: &str,
    kind: ScalarKind,
    array: bool,
) -> Result<Node, GraphError> {
    let keys = graph.schema().attribute()?;
    let mut attribute = Node::new();
    attribute.insert(keys.name.clone(), name);
    if let Some(types) = graph.module(TYPE_MODULE)? {
        let attr_type = types
            .reference(ATTR_TYPE_FIELD)
            .cloned()
            .ok_or_else(|| missing(TYPE_MODULE, ATTR_TYPE_FIELD))?;
        attribute.insert(types.require_key(TYPE_FIELD)?, attr_type);
    }
    attribute.insert(keys.array.clone(), array);
    attribute.insert(keys.dbtype.clone(), kind.as_str());
    Ok(attribute)
}

/// A type-defining node listing `attrs`. Not inserted.
pub fn new_type<S: NodeStore>(
    graph: &Graph<S>,
    name: &str,
    attrs: &[NodeId],
) -> Result<Node, GraphError> {
    let types = graph.require_module(TYPE_MODULE)?;
    let type_type = types
        .reference(TYPE_TYPE_FIELD)
        .cloned()
        .ok_or_else(|| missing(TYPE_MODULE, TYPE_TYPE_FIELD))?;
    let mut node = Node::new();
    node.insert(types.require_key(NAME_FIELD)?, name);
    node.insert(types.require_key(TYPE_FIELD)?, type_type);
    node.insert(types.require_key(ATTRS_FIELD)?, references(attrs));
    Ok(node)
}

fn missing(module: &str, field: &str) -> GraphError {
    GraphError::Structural(format!("module '{module}' has no '{field}' reference"))
}

/// The node an attribute key names.
fn attribute_id<S: NodeStore>(graph: &Graph<S>, key: &str) -> Result<NodeId, GraphError> {
    graph
        .store()
        .allocator()
        .parse_key(key)
        .ok_or_else(|| GraphError::NotAnId(key.to_string()))
}

fn installed<S: NodeStore>(graph: &Graph<S>, name: &str) -> Option<NodeId> {
    graph.modules().get(name).cloned()
}

/// Install the `attribute_id` module.
pub fn install_attribute_id_module<S: NodeStore>(
    graph: &mut Graph<S>,
) -> Result<NodeId, GraphError> {
    if let Some(id) = installed(graph, ATTRIBUTE_ID_MODULE) {
        return Ok(id);
    }
    let loader = graph.schema().loader()?.clone();

    // Phase one: shells for ids.
    let name = graph.insert(Node::new())?;
    let attrs = graph.insert(Node::new())?;
    let array = graph.insert(Node::new())?;
    let dbtype = graph.insert(Node::new())?;

    // Phase two: every attribute describes itself through the others.
    for (id, label, kind, is_array) in [
        (&name, NAME_FIELD, ScalarKind::Str, false),
        (&attrs, ATTRS_FIELD, ScalarKind::Ref, true),
        (&array, ARRAY_FIELD, ScalarKind::Bool, false),
        (&dbtype, DBTYPE_FIELD, ScalarKind::Str, false),
    ] {
        let mut node = graph.get(id)?;
        node.insert(name.key(), label);
        node.insert(dbtype.key(), kind.as_str());
        node.insert(array.key(), is_array);
        graph.update(node)?;
    }

    // The loader's own attributes become typed strings.
    for key in [&loader.scope, &loader.name, &loader.version] {
        let id = attribute_id(graph, key)?;
        let mut node = graph.get(&id)?;
        node.insert(dbtype.key(), ScalarKind::Str.as_str());
        node.insert(array.key(), false);
        graph.update(node)?;
    }

    let mut descriptor = new_module(graph, DEFAULT_SCOPE, ATTRIBUTE_ID_MODULE, DEFAULT_VERSION)?;
    descriptor.insert(NAME_FIELD, reference(&name));
    descriptor.insert(DBTYPE_FIELD, reference(&dbtype));
    descriptor.insert(ARRAY_FIELD, reference(&array));
    descriptor.insert(ATTRS_FIELD, reference(&attrs));
    let id = graph.add_module(descriptor)?;
    tracing::info!(%id, "installed attribute_id module");
    Ok(id)
}

/// Install the `link` module. Requires `attribute_id`.
pub fn install_link_module<S: NodeStore>(graph: &mut Graph<S>) -> Result<NodeId, GraphError> {
    if let Some(id) = installed(graph, LINK_MODULE) {
        return Ok(id);
    }
    let attribute = new_attr(graph, TARGET_FIELD, ScalarKind::Ref, false)?;
    let target = graph.insert(attribute)?;

    // `target` mirrors onto itself.
    let mut node = graph.get(&target)?;
    node.insert(target.key(), reference(&target));
    graph.update(node)?;

    let mut descriptor = new_module(graph, DEFAULT_SCOPE, LINK_MODULE, DEFAULT_VERSION)?;
    descriptor.insert(TARGET_FIELD, reference(&target));
    let id = graph.add_module(descriptor)?;
    tracing::info!(%id, "installed link module");
    Ok(id)
}

/// Install the `type` module. Requires `attribute_id`.
pub fn install_type_module<S: NodeStore>(graph: &mut Graph<S>) -> Result<NodeId, GraphError> {
    if let Some(id) = installed(graph, TYPE_MODULE) {
        return Ok(id);
    }
    let core = graph.require_module(ATTRIBUTE_ID_MODULE)?;

    let type_type = graph.insert(Node::new())?;
    let attr_type = graph.insert(Node::new())?;
    let mut attribute = |name: &str, kind: ScalarKind, array: bool| {
        let node = new_attr(graph, name, kind, array)?;
        graph.insert(node)
    };
    let name = attribute(NAME_FIELD, ScalarKind::Str, false)?;
    let types = attribute(TYPE_FIELD, ScalarKind::Ref, false)?;
    let attrs = attribute(ATTRS_FIELD, ScalarKind::Ref, true)?;

    let mut node = graph.get(&type_type)?;
    node.insert(name.key(), "Type");
    node.insert(types.key(), reference(&type_type));
    node.insert(attrs.key(), references([&name, &types, &attrs]));
    graph.update(node)?;

    let mut node = graph.get(&attr_type)?;
    node.insert(name.key(), "Attr");
    node.insert(types.key(), reference(&type_type));
    node.insert(attrs.key(), references([&name, &types]));
    graph.update(node)?;

    // Existing attribute-defining nodes are typed as Attr.
    let mut typed = vec![name.clone(), types.clone(), attrs.clone()];
    typed.extend(
        [NAME_FIELD, DBTYPE_FIELD, ARRAY_FIELD, ATTRS_FIELD]
            .into_iter()
            .filter_map(|field| core.get(field)),
    );
    for id in &typed {
        let mut node = graph.get(id)?;
        node.insert(types.key(), reference(&attr_type));
        graph.update(node)?;
    }

    let mut descriptor = new_module(graph, DEFAULT_SCOPE, TYPE_MODULE, DEFAULT_VERSION)?;
    descriptor.insert(TYPE_TYPE_FIELD, reference(&type_type));
    descriptor.insert(ATTR_TYPE_FIELD, reference(&attr_type));
    descriptor.insert(TYPE_FIELD, reference(&types));
    descriptor.insert(NAME_FIELD, reference(&name));
    descriptor.insert(ATTRS_FIELD, reference(&attrs));
    let id = graph.add_module(descriptor)?;
    tracing::info!(%id, "installed type module");
    Ok(id)
}

/// Join two attributes as mirrors of each other. Requires `link`.
pub fn link_attributes<S: NodeStore>(
    graph: &mut Graph<S>,
    a: &NodeId,
    b: &NodeId,
) -> Result<(), GraphError> {
    let target = graph
        .schema()
        .target
        .clone()
        .ok_or_else(|| GraphError::ModuleNotFound(LINK_MODULE.to_string()))?;
    // `b` is verified to exist before `a` changes.
    graph.get(b)?;
    let mut node = graph.get(a)?;
    node.insert(target, reference(b));
    graph.update(node)
}

/// Install `attribute_id`, `link`, and `type`, in that order.
pub fn install_standard_modules<S: NodeStore>(graph: &mut Graph<S>) -> Result<(), GraphError> {
    install_attribute_id_module(graph)?;
    install_link_module(graph)?;
    install_type_module(graph)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::config::GraphConfig;
    use crate::store::MemoryStore;
    use crate::{ErrorKind, ScalarKind};
    use serde_json::json;

    fn graph() -> Graph<MemoryStore> {
        Graph::in_memory(GraphConfig::sequential()).expect("graph")
    }

    fn standard() -> Graph<MemoryStore> {
        let mut graph = graph();
        install_standard_modules(&mut graph).expect("install");
        graph
    }

    #[test]
    fn attribute_id_describes_itself() {
        let mut graph = graph();
        let id = install_attribute_id_module(&mut graph).expect("install");
        assert_eq!(graph.modules().get(ATTRIBUTE_ID_MODULE), Some(&id));

        let keys = graph.schema().attribute().expect("keys").clone();
        let name = graph.get(&NodeId::Seq(104)).expect("name attribute");
        assert_eq!(name.get(&keys.name), Some(&json!("name")));
        assert_eq!(name.get(&keys.dbtype), Some(&json!("str")));
        assert_eq!(name.get(&keys.array), Some(&json!(false)));

        let attrs = graph.get(&NodeId::Seq(105)).expect("attrs attribute");
        assert_eq!(attrs.get(&keys.dbtype), Some(&json!("ref")));
        assert_eq!(attrs.get(&keys.array), Some(&json!(true)));
    }

    #[test]
    fn attribute_id_types_loader_attributes() {
        let mut graph = graph();
        install_attribute_id_module(&mut graph).expect("install");
        let attribute = graph.schema().attribute().expect("keys").clone();
        let loader = graph.schema().loader().expect("loader").clone();
        for key in [loader.scope, loader.name, loader.version] {
            let node = graph.get(&attribute_id(&graph, &key).expect("id")).expect("node");
            assert_eq!(node.get(&attribute.dbtype), Some(&json!("str")));
            assert_eq!(node.get(&attribute.array), Some(&json!(false)));
        }
    }

    #[test]
    fn installers_are_idempotent() {
        let mut graph = standard();
        let before = graph.store().len().expect("len");
        let modules = graph.modules().clone();
        install_standard_modules(&mut graph).expect("reinstall");
        assert_eq!(graph.store().len().expect("len"), before);
        assert_eq!(graph.modules(), &modules);
    }

    #[test]
    fn link_target_mirrors_itself() {
        let graph = standard();
        let target = graph.require_module(LINK_MODULE).expect("link");
        let target_id = target.get(TARGET_FIELD).expect("target ref");
        let node = graph.get(&target_id).expect("target attribute");
        assert_eq!(node.get(&target_id.key()), Some(&reference(&target_id)));
        assert_eq!(graph.schema().target, Some(target_id.key()));
    }

    #[test]
    fn link_attributes_is_symmetric() {
        let mut graph = standard();
        let parent = graph
            .insert(new_attr(&graph, "parent", ScalarKind::Ref, false).expect("attr"))
            .expect("insert");
        let children = graph
            .insert(new_attr(&graph, "children", ScalarKind::Ref, true).expect("attr"))
            .expect("insert");
        link_attributes(&mut graph, &parent, &children).expect("link");

        let target = graph.schema().target.clone().expect("target key");
        let children_node = graph.get(&children).expect("children");
        assert_eq!(children_node.get(&target), Some(&reference(&parent)));
    }

    #[test]
    fn link_attributes_requires_link_module() {
        let mut graph = graph();
        install_attribute_id_module(&mut graph).expect("install");
        let err = link_attributes(&mut graph, &NodeId::Seq(104), &NodeId::Seq(105))
            .expect_err("no link module");
        assert!(matches!(err, GraphError::ModuleNotFound(_)));
    }

    #[test]
    fn type_module_types_attributes() {
        let graph = standard();
        let types = graph.require_module(TYPE_MODULE).expect("type module");
        let type_key = types.require_key(TYPE_FIELD).expect("type key");
        let attr_type = types.reference(ATTR_TYPE_FIELD).cloned().expect("attr_type");

        let name_attr = graph.get(&NodeId::Seq(104)).expect("name attribute");
        assert_eq!(name_attr.get(&type_key), Some(&attr_type));

        let fresh = new_attr(&graph, "count", ScalarKind::Int, false).expect("attr");
        assert_eq!(fresh.get(&type_key), Some(&attr_type));
    }

    #[test]
    fn new_type_lists_attributes() {
        let mut graph = standard();
        let count = graph
            .insert(new_attr(&graph, "count", ScalarKind::Int, false).expect("attr"))
            .expect("insert");
        let counter = graph
            .insert(new_type(&graph, "Counter", std::slice::from_ref(&count)).expect("type"))
            .expect("insert");

        let types = graph.require_module(TYPE_MODULE).expect("type module");
        let node = graph.get(&counter).expect("type node");
        let attrs_key = types.require_key(ATTRS_FIELD).expect("attrs key");
        assert_eq!(node.get(&attrs_key), Some(&json!([reference(&count)])));
        assert_eq!(
            node.get(&types.require_key(TYPE_FIELD).expect("type key")),
            types.reference(TYPE_TYPE_FIELD)
        );
    }

    #[test]
    fn new_type_requires_type_module() {
        let graph = graph();
        let err = new_type(&graph, "T", &[]).expect_err("no type module");
        assert_eq!(err.kind(), ErrorKind::Lookup);
    }

    #[test]
    fn new_attr_requires_attribute_id() {
        let graph = graph();
        let err = new_attr(&graph, "x", ScalarKind::Str, false).expect_err("no attribute_id");
        assert!(matches!(err, GraphError::ModuleNotFound(_)));
    }
}
