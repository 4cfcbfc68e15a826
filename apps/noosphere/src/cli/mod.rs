//! # Noosphere CLI Module
//!
//! This module implements the CLI interface for Noosphere.
//!
//! ## Available Commands
//!
//! - `clear` - Wipe the graph, optionally installing the standard modules
//! - `bootstrap` - Install the standard modules into the current graph
//! - `ls` - List nodes, optionally filtered by a predicate
//! - `get` - Show one node
//! - `add` - Insert a node
//! - `update` - Replace a node
//! - `rm` - Remove a node
//! - `modules` - List registered modules

mod commands;

use crate::config::{AppConfig, BackendKind};
use clap::{Parser, Subcommand};
use noosphere_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Noosphere - self-describing graph store
///
/// A flat graph of JSON nodes whose schema lives in the graph itself.
#[derive(Parser, Debug)]
#[command(name = "noosphere")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress confirmation output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the graph database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Wipe the graph down to the Root Loader and `loader`
    Clear {
        /// Also install attribute_id, link, and type
        #[arg(short, long)]
        standard: bool,
    },

    /// Install the standard modules
    Bootstrap,

    /// List nodes
    Ls {
        /// Predicate as JSON, e.g. '{"has": "name"}'
        #[arg(short = 'w', long = "where")]
        filter: Option<String>,
    },

    /// Show one node
    Get {
        /// Node id
        id: String,
    },

    /// Insert a node (read from stdin when --data is omitted)
    Add {
        /// Node as a JSON object
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Replace a node; the JSON object must carry its id
    Update {
        /// Node as a JSON object
        #[arg(short, long)]
        data: String,
    },

    /// Remove a node
    Rm {
        /// Node id
        id: String,
    },

    /// List registered modules
    Modules,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GraphError> {
    let config = AppConfig::load(cli.config.as_deref())?
        .with_overrides(cli.database.clone(), cli.backend);
    tracing::debug!(
        database = %config.storage.database.display(),
        backend = config.storage.backend.as_str(),
        "opening graph"
    );
    let mut graph = open_graph(&config)?;

    // No subcommand - list modules by default
    let command = cli.command.clone().unwrap_or(Commands::Modules);
    let command = match command {
        Commands::Add { data: None } => Commands::Add {
            data: Some(read_stdin()?),
        },
        other => other,
    };

    let output = run(&mut graph, &command)?;
    print_output(&output, cli.json_mode, cli.quiet);
    Ok(())
}

fn read_stdin() -> Result<String, GraphError> {
    std::io::read_to_string(std::io::stdin())
        .map_err(|e| GraphError::IoError(format!("Cannot read stdin: {}", e)))
}
