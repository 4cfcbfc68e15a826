//! # Query Predicates
//!
//! Structured filters for `Graph::find`.
//!
//! Predicates are plain data: they serialize to JSON, so callers outside
//! the process (the CLI's `--where` flag) can express them without running
//! code.
//!
//! ```json
//! {"and": [{"has": "name"}, {"compare": {"key": "age", "op": "ge", "value": 18}}]}
//! ```

use crate::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Array membership or substring match.
    Contains,
}

/// A filter over nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Matches every node.
    #[default]
    All,
    /// The node carries the attribute key.
    Has(String),
    /// Compare an attribute value with a constant.
    Compare {
        key: String,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    #[must_use]
    pub fn has(key: impl Into<String>) -> Self {
        Self::Has(key.into())
    }

    #[must_use]
    pub fn compare(key: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// `key == value`.
    #[must_use]
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(key, CompareOp::Eq, value)
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match self {
            Self::And(mut all) => {
                all.push(other);
                Self::And(all)
            }
            first => Self::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match self {
            Self::Or(mut any) => {
                any.push(other);
                Self::Or(any)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluate against a node.
    #[must_use]
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Self::All => true,
            Self::Has(key) => node.contains_key(key),
            Self::Compare { key, op, value } => compare(node.get(key), *op, value),
            Self::And(all) => all.iter().all(|p| p.matches(node)),
            Self::Or(any) => any.iter().any(|p| p.matches(node)),
            Self::Not(inner) => !inner.matches(node),
        }
    }
}

/// Numbers compare by value, so `1` equals `1.0`.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare(actual: Option<&Value>, op: CompareOp, expected: &Value) -> bool {
    let Some(actual) = actual else {
        // An absent attribute is only ever "not equal".
        return op == CompareOp::Ne;
    };
    match op {
        CompareOp::Eq => json_eq(actual, expected),
        CompareOp::Ne => !json_eq(actual, expected),
        CompareOp::Lt => order(actual, expected) == Some(Ordering::Less),
        CompareOp::Le => matches!(
            order(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => order(actual, expected) == Some(Ordering::Greater),
        CompareOp::Ge => matches!(
            order(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::Contains => match (actual, expected) {
            (Value::Array(items), _) => items.iter().any(|item| json_eq(item, expected)),
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            _ => false,
        },
    }
}
