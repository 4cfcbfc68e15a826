//! # Integrity Validator
//!
//! Checks attribute values against the declared schema before a write is
//! accepted.
//!
//! Without an `attribute_id` module, every value only has to be well formed.
//! With one, attribute keys that are identifiers are checked against the
//! element kind and array-ness declared on the attribute-defining node.
//! Plain string keys are still accepted, with a warning.

use crate::registry::Schema;
use crate::store::NodeStore;
use crate::{GraphError, ID_KEY, Node, ScalarKind, ValueKind};
use serde_json::Value;

/// Classify a stored value.
///
/// A mapping is a reference only when its single key is `id`; any other
/// mapping is malformed.
pub fn classify(value: &Value) -> Result<ValueKind, GraphError> {
    Ok(match value {
        Value::Null => ValueKind::None,
        Value::Array(_) => ValueKind::Arr,
        Value::String(_) => ValueKind::Str,
        Value::Bool(_) => ValueKind::Bool,
        Value::Number(n) if n.is_f64() => ValueKind::Float,
        Value::Number(_) => ValueKind::Int,
        Value::Object(map) if map.len() == 1 && map.contains_key(ID_KEY) => ValueKind::Ref,
        Value::Object(_) => {
            return Err(GraphError::Structural(format!(
                "unrecognized value {value}, a mapping must be a single-key reference"
            )));
        }
    })
}

/// Check one value against an optional declared kind and array-ness.
///
/// Null elements of an array are ignored, and a null value always passes the
/// kind comparison.
pub fn valid_attribute(
    value: &Value,
    assumed_kind: Option<ScalarKind>,
    assumed_array: Option<bool>,
) -> Result<(), GraphError> {
    let mut kind = classify(value)?;
    let is_array = kind == ValueKind::Arr;

    match assumed_array {
        Some(false) if is_array => {
            return Err(GraphError::TypeMismatch(format!(
                "value {value} is an array but the attribute is not"
            )));
        }
        Some(true) if !is_array => {
            return Err(GraphError::TypeMismatch(format!(
                "value {value} is not an array but the attribute is"
            )));
        }
        _ => {}
    }

    if let Value::Array(elements) = value {
        kind = ValueKind::None;
        for element in elements {
            let element_kind = classify(element)?;
            match element_kind {
                ValueKind::None => continue,
                ValueKind::Arr => {
                    return Err(GraphError::Structural(format!(
                        "array {value} contains another array"
                    )));
                }
                _ if kind == ValueKind::None => kind = element_kind,
                _ if kind != element_kind => {
                    return Err(GraphError::Structural(format!(
                        "array {value} mixes elements of kinds {kind} and {element_kind}"
                    )));
                }
                _ => {}
            }
        }
    }

    if let Some(expected) = assumed_kind
        && kind != ValueKind::None
        && kind != ValueKind::from(expected)
    {
        return Err(GraphError::TypeMismatch(format!(
            "value {value} of kind {kind} should have been {expected}"
        )));
    }
    Ok(())
}

/// Validates whole nodes against the schema resolved by discovery.
#[derive(Debug)]
pub struct IntegrityValidator<'a, S: ?Sized> {
    store: &'a S,
    schema: &'a Schema,
}

impl<'a, S: NodeStore + ?Sized> IntegrityValidator<'a, S> {
    #[must_use]
    pub fn new(store: &'a S, schema: &'a Schema) -> Self {
        Self { store, schema }
    }

    /// Check every attribute of `node`.
    ///
    /// A key that parses as an identifier but names no node is a lookup
    /// error. Defining nodes lacking `dbtype` or `array` leave the value
    /// unconstrained.
    pub fn valid_entry(&self, node: &Node) -> Result<(), GraphError> {
        let Some(keys) = &self.schema.attribute else {
            for (_, value) in node.iter() {
                valid_attribute(value, None, None)?;
            }
            return Ok(());
        };
        let ids = self.store.allocator();
        let loader_name = self.schema.loader.as_ref().map(|loader| loader.name.as_str());

        for (key, value) in node.iter() {
            if *key == keys.dbtype {
                if !(value.is_null() || value.as_str().and_then(ScalarKind::parse).is_some()) {
                    return Err(GraphError::Structural(format!(
                        "dbtype has invalid value {value}"
                    )));
                }
            } else if let Some(attr_id) = ids.parse_key(key) {
                let defining = self
                    .store
                    .get(&attr_id)?
                    .ok_or(GraphError::NodeNotFound(attr_id))?;
                match (defining.get(&keys.dbtype), defining.get(&keys.array)) {
                    (Some(dbtype), Some(array)) => {
                        let (kind, array) = declared(dbtype, array, &defining)?;
                        valid_attribute(value, kind, array)?;
                        continue;
                    }
                    _ => tracing::warn!(
                        attribute = %defining,
                        "attribute lacks dbtype or array, value is unconstrained"
                    ),
                }
            } else if key != ID_KEY
                && !node.is_root_loader()
                && !loader_name.is_some_and(|name| node.contains_key(name))
            {
                tracing::warn!(
                    key = %key,
                    node = %node,
                    "plain attribute name used while attribute typing is enabled"
                );
            }
            valid_attribute(value, None, None)?;
        }
        Ok(())
    }
}

/// Read the declared kind and array-ness off an attribute-defining node.
fn declared(
    dbtype: &Value,
    array: &Value,
    defining: &Node,
) -> Result<(Option<ScalarKind>, Option<bool>), GraphError> {
    let kind = match dbtype {
        Value::Null => None,
        Value::String(tag) => Some(ScalarKind::parse(tag).ok_or_else(|| {
            GraphError::Structural(format!("attribute {defining} declares unknown dbtype"))
        })?),
        _ => {
            return Err(GraphError::Structural(format!(
                "attribute {defining} declares a non-string dbtype"
            )));
        }
    };
    let array = match array {
        Value::Null => None,
        Value::Bool(flag) => Some(*flag),
        _ => {
            return Err(GraphError::Structural(format!(
                "attribute {defining} declares a non-boolean array flag"
            )));
        }
    };
    Ok((kind, array))
}

// =============================================================================
// TESTS
// =============================================================================
