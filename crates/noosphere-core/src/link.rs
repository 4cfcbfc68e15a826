//! # Reference Synchronizer
//!
//! Keeps bidirectional references consistent after writes.
//!
//! An attribute whose defining node has `dbtype == "ref"` and a non-null
//! `target` is mirrored: when node X gains a reference to Y under attribute
//! A, Y gains a reference back to X under the target attribute B, and the
//! reverse happens on removal.
//!
//! Reconciliation runs in two steps. [`ReferenceSynchronizer::plan`] only
//! reads and computes the final state of every touched node;
//! [`SyncPlan::apply`] writes them. A plan that fails leaves the store
//! untouched. Peer writes go straight to the store and are neither
//! validated nor reconciled again.

use crate::registry::{AttributeKeys, Schema};
use crate::store::NodeStore;
use crate::{GraphError, Node, NodeId, reference, referenced_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// What happens when a scalar mirror slot already references another node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarMirrorPolicy {
    /// Overwrite the slot.
    #[default]
    Overwrite,
    /// Fail with a structural error.
    Reject,
    /// Drop the target from the previous occupant's forward attribute, then
    /// overwrite.
    Unlink,
}

/// A mirrored attribute as declared in the schema.
#[derive(Debug, Clone)]
struct Relation {
    /// Forward attribute key on the origin.
    forward: String,
    /// Whether the forward attribute holds an array.
    forward_array: bool,
    /// Mirror attribute key on the peers.
    mirror: String,
    /// Whether the mirror attribute holds an array.
    mirror_array: bool,
}

/// The final state of every node touched by one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncPlan {
    writes: BTreeMap<NodeId, Node>,
}

impl SyncPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Ids of the nodes the plan will write.
    pub fn touched(&self) -> impl Iterator<Item = &NodeId> {
        self.writes.keys()
    }

    /// Take the planned state of one node out of the plan.
    pub fn take(&mut self, id: &NodeId) -> Option<Node> {
        self.writes.remove(id)
    }

    /// Persist every planned node.
    pub fn apply<S: NodeStore + ?Sized>(self, store: &mut S) -> Result<(), GraphError> {
        for (_, node) in self.writes {
            store.update(node)?;
        }
        Ok(())
    }
}

/// Plans mirror updates against the current store contents.
#[derive(Debug)]
pub struct ReferenceSynchronizer<'a, S: ?Sized> {
    store: &'a S,
    schema: &'a Schema,
    policy: ScalarMirrorPolicy,
}

/// Planning state: nodes read so far, with pending modifications.
struct Workspace<'a, S: ?Sized> {
    store: &'a S,
    nodes: BTreeMap<NodeId, Node>,
    dirty: BTreeSet<NodeId>,
}

impl<S: NodeStore + ?Sized> Workspace<'_, S> {
    fn fetch(&mut self, id: &NodeId) -> Result<Option<&mut Node>, GraphError> {
        if !self.nodes.contains_key(id) {
            match self.store.get(id)? {
                Some(node) => {
                    self.nodes.insert(id.clone(), node);
                }
                None => return Ok(None),
            }
        }
        Ok(self.nodes.get_mut(id))
    }

    fn touch(&mut self, id: &NodeId) {
        self.dirty.insert(id.clone());
    }
}

impl<'a, S: NodeStore + ?Sized> ReferenceSynchronizer<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, schema: &'a Schema, policy: ScalarMirrorPolicy) -> Self {
        Self {
            store,
            schema,
            policy,
        }
    }

    /// Whether both `attribute_id` and `link` modules are installed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.schema.links().is_some()
    }

    /// Compute the mirror updates implied by replacing `old` with `new`.
    ///
    /// `None` stands for an absent node (insert has no old state, remove no
    /// new state). The origin's own pending state is `new`, so a plan may
    /// include the origin when it mirrors onto itself.
    pub fn plan(&self, old: Option<&Node>, new: Option<&Node>) -> Result<SyncPlan, GraphError> {
        let Some((keys, target_key)) = self.schema.links() else {
            return Ok(SyncPlan::default());
        };
        let origin = new
            .and_then(Node::id)
            .or_else(|| old.and_then(Node::id))
            .ok_or_else(|| {
                GraphError::NotAnId("reconciliation needs a node carrying an id".to_string())
            })?;

        let mut work = Workspace {
            store: self.store,
            nodes: BTreeMap::new(),
            dirty: BTreeSet::new(),
        };
        if let Some(new) = new {
            work.nodes.insert(origin.clone(), new.clone());
        }

        let mut candidate_keys: Vec<&String> = Vec::new();
        for key in old.into_iter().chain(new).flat_map(|node| node.keys()) {
            if !candidate_keys.contains(&key) {
                candidate_keys.push(key);
            }
        }

        for key in candidate_keys {
            let Some(relation) = self.relation(&mut work, keys, target_key, key)? else {
                continue;
            };
            let before = referenced_ids(old.and_then(|n| n.get(key)));
            let after = referenced_ids(new.and_then(|n| n.get(key)));

            for peer in before.difference(&after) {
                self.unmirror(&mut work, &relation, &origin, peer)?;
            }
            for peer in after.difference(&before) {
                self.mirror(&mut work, &relation, &origin, peer)?;
            }
        }

        let Workspace {
            mut nodes, dirty, ..
        } = work;
        let writes: BTreeMap<NodeId, Node> = dirty
            .into_iter()
            .filter_map(|id| nodes.remove(&id).map(|node| (id, node)))
            .collect();
        tracing::debug!(%origin, writes = writes.len(), "planned reference reconciliation");
        Ok(SyncPlan { writes })
    }

    /// Resolve `key` to a mirrored relation, if it is one.
    fn relation(
        &self,
        work: &mut Workspace<'_, S>,
        keys: &AttributeKeys,
        target_key: &str,
        key: &str,
    ) -> Result<Option<Relation>, GraphError> {
        let Some(attr_id) = self.store.allocator().parse_key(key) else {
            return Ok(None);
        };
        let Some(attribute) = work.fetch(&attr_id)? else {
            tracing::warn!(%attr_id, "attribute-defining node is missing, not reconciled");
            return Ok(None);
        };
        if attribute.get(&keys.dbtype).and_then(Value::as_str) != Some("ref") {
            return Ok(None);
        }
        let Some(mirror_id) = attribute.get(target_key).and_then(referenced_id) else {
            return Ok(None);
        };
        let forward_array = is_array(attribute, &keys.array);

        let mirror_attribute = work
            .fetch(&mirror_id)?
            .ok_or_else(|| GraphError::NodeNotFound(mirror_id.clone()))?;
        let mirror_array = is_array(mirror_attribute, &keys.array);

        Ok(Some(Relation {
            forward: key.to_string(),
            forward_array,
            mirror: mirror_id.key(),
            mirror_array,
        }))
    }

    /// `origin` gained a reference to `peer`.
    fn mirror(
        &self,
        work: &mut Workspace<'_, S>,
        relation: &Relation,
        origin: &NodeId,
        peer: &NodeId,
    ) -> Result<(), GraphError> {
        let origin_ref = reference(origin);
        let node = work
            .fetch(peer)?
            .ok_or_else(|| GraphError::NodeNotFound(peer.clone()))?;

        if relation.mirror_array {
            let slot = node
                .get_mut(&relation.mirror)
                .filter(|value| !value.is_null());
            match slot {
                None => {
                    node.insert(relation.mirror.clone(), Value::Array(vec![origin_ref]));
                }
                Some(Value::Array(items)) => {
                    if items.contains(&origin_ref) {
                        return Ok(());
                    }
                    items.push(origin_ref);
                }
                Some(other) => {
                    return Err(GraphError::Structural(format!(
                        "mirror attribute {} of {} holds non-array {}",
                        relation.mirror, peer, other
                    )));
                }
            }
            work.touch(peer);
            return Ok(());
        }

        let occupant = node.get(&relation.mirror).and_then(referenced_id);
        match occupant {
            Some(ref current) if current == origin => return Ok(()),
            Some(current) => match self.policy {
                ScalarMirrorPolicy::Overwrite => {}
                ScalarMirrorPolicy::Reject => {
                    return Err(GraphError::Structural(format!(
                        "mirror attribute {} of {} already references {}",
                        relation.mirror, peer, current
                    )));
                }
                ScalarMirrorPolicy::Unlink => {
                    Self::drop_forward(work, relation, &current, peer)?;
                }
            },
            None => {}
        }

        let node = work
            .fetch(peer)?
            .ok_or_else(|| GraphError::NodeNotFound(peer.clone()))?;
        node.insert(relation.mirror.clone(), origin_ref);
        work.touch(peer);
        Ok(())
    }

    /// `origin` lost its reference to `peer`.
    fn unmirror(
        &self,
        work: &mut Workspace<'_, S>,
        relation: &Relation,
        origin: &NodeId,
        peer: &NodeId,
    ) -> Result<(), GraphError> {
        let origin_ref = reference(origin);
        let Some(node) = work.fetch(peer)? else {
            tracing::warn!(%peer, %origin, "referenced node is gone, nothing to unlink");
            return Ok(());
        };

        let changed = match node.get_mut(&relation.mirror) {
            Some(Value::Array(items)) => {
                let before = items.len();
                items.retain(|item| *item != origin_ref);
                items.len() != before
            }
            Some(slot) if referenced_id(slot).as_ref() == Some(origin) => {
                *slot = Value::Null;
                true
            }
            _ => false,
        };
        if changed {
            work.touch(peer);
        }
        Ok(())
    }

    /// Remove `peer` from the forward attribute of its previous occupant.
    fn drop_forward(
        work: &mut Workspace<'_, S>,
        relation: &Relation,
        occupant: &NodeId,
        peer: &NodeId,
    ) -> Result<(), GraphError> {
        let peer_ref = reference(peer);
        let Some(node) = work.fetch(occupant)? else {
            return Ok(());
        };
        let changed = match node.get_mut(&relation.forward) {
            Some(Value::Array(items)) if relation.forward_array => {
                let before = items.len();
                items.retain(|item| *item != peer_ref);
                items.len() != before
            }
            Some(slot) if referenced_id(slot).as_ref() == Some(peer) => {
                *slot = Value::Null;
                true
            }
            _ => false,
        };
        if changed {
            tracing::debug!(%occupant, %peer, "unlinked previous mirror occupant");
            work.touch(occupant);
        }
        Ok(())
    }
}

fn is_array(attribute: &Node, array_key: &str) -> bool {
    attribute
        .get(array_key)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Ids referenced by a scalar or array value. Null or missing is empty.
fn referenced_ids(value: Option<&Value>) -> BTreeSet<NodeId> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(referenced_id).collect(),
        Some(value) => referenced_id(value).into_iter().collect(),
        None => BTreeSet::new(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
