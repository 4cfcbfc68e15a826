//! # Property-Based Tests
//!
//! Invariants of the graph engine checked with proptest.

use noosphere_core::{
    Graph, GraphConfig, IdAllocator, Node, NodeId, NodeStore, ScalarKind, install_standard_modules,
    link_attributes, new_attr, reference, valid_attribute,
};
use proptest::collection::vec;
use proptest::prelude::*;
use serde_json::{Value, json};
use std::collections::BTreeSet;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Inserted ids are pairwise distinct and all resolve.
    #[test]
    fn inserted_ids_are_unique(count in 1usize..40, sequential in any::<bool>()) {
        let config = if sequential { GraphConfig::sequential() } else { GraphConfig::default() };
        let mut graph = Graph::in_memory(config).expect("graph");
        let mut seen = BTreeSet::new();
        for i in 0..count {
            let mut node = Node::new();
            node.insert("n", i);
            let id = graph.insert(node).expect("insert");
            prop_assert!(graph.store().allocator().accepts(&id));
            prop_assert!(seen.insert(id));
        }
        for id in &seen {
            prop_assert!(graph.get(id).is_ok());
        }
    }

    /// Mutating a node handed out never changes the stored copy.
    #[test]
    fn reads_are_copies(values in vec(scalar(), 1..8)) {
        let mut graph = Graph::in_memory(GraphConfig::sequential()).expect("graph");
        let mut node = Node::new();
        for (i, value) in values.iter().enumerate() {
            node.insert(format!("k{i}"), value.clone());
        }
        let id = graph.insert(node).expect("insert");

        let mut copy = graph.get(&id).expect("get");
        copy.insert("k0", "changed");
        copy.remove("k1");

        let stored = graph.get(&id).expect("get");
        prop_assert_eq!(stored.get("k0"), values.first());
        prop_assert_eq!(stored.get("k1"), values.get(1));
    }

    /// Homogeneous scalar arrays pass when declared as arrays of their kind.
    #[test]
    fn homogeneous_int_arrays_are_valid(items in vec(any::<i64>(), 0..16)) {
        let value = json!(items);
        prop_assert!(valid_attribute(&value, Some(ScalarKind::Int), Some(true)).is_ok());
        prop_assert!(valid_attribute(&value, Some(ScalarKind::Int), Some(false)).is_err());
    }

    /// Any string element among integers breaks homogeneity.
    #[test]
    fn mixed_arrays_are_invalid(items in vec(any::<i64>(), 1..16), at in any::<prop::sample::Index>()) {
        let mut values: Vec<Value> = items.into_iter().map(Value::from).collect();
        let slot = at.index(values.len());
        values[slot] = Value::from("x");
        if values.len() > 1 {
            prop_assert!(valid_attribute(&Value::Array(values), None, None).is_err());
        }
    }

    /// Writing a node back unchanged leaves every mirrored peer as it was.
    #[test]
    fn resync_is_idempotent(parents in vec(0usize..4, 1..8)) {
        let mut graph = Graph::in_memory(GraphConfig::sequential()).expect("graph");
        install_standard_modules(&mut graph).expect("install");
        let parent = new_attr(&graph, "parent", ScalarKind::Ref, false).expect("attr");
        let parent = graph.insert(parent).expect("insert");
        let children = new_attr(&graph, "children", ScalarKind::Ref, true).expect("attr");
        let children = graph.insert(children).expect("insert");
        link_attributes(&mut graph, &parent, &children).expect("link");

        let hubs: Vec<NodeId> = (0..4)
            .map(|_| graph.insert(Node::new()).expect("insert"))
            .collect();
        let mut leaves = Vec::new();
        for index in &parents {
            let mut leaf = Node::new();
            leaf.insert(parent.key(), reference(&hubs[*index]));
            leaves.push(graph.insert(leaf).expect("insert"));
        }

        let before = graph.store().all().expect("all");
        for id in leaves.iter().chain(&hubs) {
            let node = graph.get(id).expect("get");
            graph.update(node).expect("update");
        }
        prop_assert_eq!(graph.store().all().expect("all"), before);

        let total: usize = hubs
            .iter()
            .map(|hub| {
                graph
                    .get(hub)
                    .expect("hub")
                    .get(&children.key())
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len)
            })
            .sum();
        prop_assert_eq!(total, parents.len());
    }

    /// Sequential ids keep counting after interleaved removals.
    #[test]
    fn sequential_ids_never_repeat(ops in vec(any::<bool>(), 1..30)) {
        let mut graph = Graph::in_memory(GraphConfig::sequential()).expect("graph");
        let mut live: Vec<NodeId> = Vec::new();
        let mut last: Option<NodeId> = None;
        for insert in ops {
            if insert || live.is_empty() {
                let id = graph.insert(Node::new()).expect("insert");
                if let Some(previous) = &last {
                    prop_assert!(id > *previous);
                }
                last = Some(id.clone());
                live.push(id);
            } else if let Some(id) = live.pop() {
                graph.remove(&id).expect("remove");
            }
        }
        prop_assert_eq!(
            graph.store().allocator().clone(),
            match last {
                Some(NodeId::Seq(n)) => IdAllocator::Sequential { last_id: n + 1 },
                _ => IdAllocator::sequential(),
            }
        );
    }
}
