//! # Identifier Allocation
//!
//! Produces unique node identifiers and classifies candidate identifiers.
//!
//! Two strategies share one persisted-state shape:
//! - Sequential: integer counter seeded at `SEQUENTIAL_SEED`,
//!   persisted as `{"last_id": <int>}`
//! - Token: `!` followed by a fixed number of random alphanumerics,
//!   persisted as `{"ids_len": <int>}`
//!
//! The Root Loader id `!0` is valid under both strategies.

use crate::primitives::{SEQUENTIAL_SEED, TOKEN_PREFIX};
use crate::{GraphError, NodeId, ROOT_LOADER_ID};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier allocator state.
///
/// Serialized untagged so the persisted `ids` block is exactly
/// `{"last_id": n}` or `{"ids_len": n}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdAllocator {
    /// Monotonic integer ids. `last_id` is the next value to hand out.
    Sequential { last_id: u64 },
    /// Random `!`-prefixed alphanumeric ids of length `ids_len`.
    Token { ids_len: usize },
}

impl IdAllocator {
    /// Sequential allocator seeded at 100.
    #[must_use]
    pub fn sequential() -> Self {
        Self::Sequential {
            last_id: SEQUENTIAL_SEED,
        }
    }

    /// Token allocator with the given length.
    #[must_use]
    pub fn token(length: usize) -> Self {
        Self::Token { ids_len: length }
    }

    /// Whether a JSON value is a valid identifier under this strategy.
    #[must_use]
    pub fn is_id(&self, value: &Value) -> bool {
        NodeId::from_value(value).is_some_and(|id| self.accepts(&id))
    }

    /// Whether an identifier is valid under this strategy.
    #[must_use]
    pub fn accepts(&self, id: &NodeId) -> bool {
        if id.is_root() {
            return true;
        }
        match (self, id) {
            (Self::Sequential { .. }, NodeId::Seq(_)) => true,
            (Self::Token { ids_len }, NodeId::Token(t)) => is_token(t, *ids_len),
            _ => false,
        }
    }

    /// Interpret an attribute key as an identifier.
    ///
    /// Attribute keys are strings, so sequential ids appear as decimal digits.
    #[must_use]
    pub fn parse_key(&self, key: &str) -> Option<NodeId> {
        if key == ROOT_LOADER_ID {
            return Some(NodeId::root());
        }
        match self {
            Self::Sequential { .. } => {
                if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                // Only the canonical spelling names a node: "0109" is not 109.
                key.parse::<u64>()
                    .ok()
                    .filter(|n| n.to_string() == key)
                    .map(NodeId::Seq)
            }
            Self::Token { ids_len } => {
                is_token(key, *ids_len).then(|| NodeId::Token(key.to_string()))
            }
        }
    }

    /// Allocate an identifier for which `exists` reports `false`.
    ///
    /// The sequential strategy fails with `GraphError::Allocation` when its
    /// next value is already taken, which means the store was modified
    /// behind the allocator's back. The token strategy redraws until free;
    /// a zero-length token can only ever spell `!`, so it is refused outright.
    /// Errors from `exists` are propagated unchanged.
    pub fn new_id(
        &mut self,
        mut exists: impl FnMut(&NodeId) -> Result<bool, GraphError>,
    ) -> Result<NodeId, GraphError> {
        match self {
            Self::Sequential { last_id } => {
                let id = NodeId::Seq(*last_id);
                if exists(&id)? {
                    return Err(GraphError::Allocation(id));
                }
                *last_id = last_id.saturating_add(1);
                Ok(id)
            }
            Self::Token { ids_len: 0 } => Err(GraphError::Allocation(NodeId::Token(
                TOKEN_PREFIX.to_string(),
            ))),
            Self::Token { ids_len } => {
                let mut rng = rand::thread_rng();
                loop {
                    let body: String = (0..*ids_len)
                        .map(|_| char::from(rng.sample(Alphanumeric)))
                        .collect();
                    let id = NodeId::Token(format!("{TOKEN_PREFIX}{body}"));
                    if !id.is_root() && !exists(&id)? {
                        return Ok(id);
                    }
                }
            }
        }
    }
}

fn is_token(s: &str, length: usize) -> bool {
    if s == ROOT_LOADER_ID {
        return true;
    }
    s.strip_prefix(TOKEN_PREFIX).is_some_and(|body| {
        body.len() == length && body.chars().all(|c| c.is_ascii_alphanumeric())
    })
}

// =============================================================================
// TESTS
// =============================================================================
