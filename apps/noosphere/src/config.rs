//! Application configuration.
//!
//! Read from an optional TOML file:
//!
//! ```toml
//! [graph]
//! scalar_mirror = "unlink"
//! id_strategy = { kind = "sequential" }
//!
//! [storage]
//! database = "graph.redb"
//! backend = "redb"
//! ```
//!
//! Command-line flags override the `[storage]` table.

use clap::ValueEnum;
use noosphere_core::{GraphConfig, GraphError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default database path when neither the config file nor a flag names one.
pub const DEFAULT_DATABASE: &str = "noosphere.json";

/// Persistent storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON document rewritten on every change.
    #[default]
    File,
    /// redb database with one transaction per change.
    Redb,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

/// The `[storage]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub backend: BackendKind,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            backend: BackendKind::default(),
        }
    }
}

/// Whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, GraphError> {
        toml::from_str(content)
            .map_err(|e| GraphError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Load `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, GraphError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Apply command-line overrides to the storage table.
    #[must_use]
    pub fn with_overrides(mut self, database: Option<PathBuf>, backend: Option<BackendKind>) -> Self {
        if let Some(database) = database {
            self.storage.database = database;
        }
        if let Some(backend) = backend {
            self.storage.backend = backend;
        }
        self
    }
}
