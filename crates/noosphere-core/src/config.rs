//! Graph configuration.

use crate::identifier::IdAllocator;
use crate::link::ScalarMirrorPolicy;
use crate::primitives::DEFAULT_TOKEN_LENGTH;
use serde::{Deserialize, Serialize};

/// How fresh node identifiers are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdStrategy {
    /// Integers counting up from 100.
    Sequential,
    /// `!` followed by `length` random alphanumerics.
    Token { length: usize },
}

impl Default for IdStrategy {
    fn default() -> Self {
        Self::Token {
            length: DEFAULT_TOKEN_LENGTH,
        }
    }
}

impl IdStrategy {
    /// A fresh allocator for this strategy.
    #[must_use]
    pub fn allocator(self) -> IdAllocator {
        match self {
            Self::Sequential => IdAllocator::sequential(),
            Self::Token { length } => IdAllocator::token(length),
        }
    }
}

/// Behaviour knobs of a [`crate::Graph`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub id_strategy: IdStrategy,
    pub scalar_mirror: ScalarMirrorPolicy,
}

impl GraphConfig {
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            id_strategy: IdStrategy::Sequential,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_scalar_mirror(mut self, policy: ScalarMirrorPolicy) -> Self {
        self.scalar_mirror = policy;
        self
    }

    /// A fresh allocator for the configured strategy.
    #[must_use]
    pub fn allocator(&self) -> IdAllocator {
        self.id_strategy.allocator()
    }
}
