//! # CLI Command Implementations
//!
//! Every command runs against an open [`Graph`] and returns an [`Output`];
//! rendering is left to [`print_output`].

use crate::config::{AppConfig, BackendKind};
use noosphere_core::{
    FileStore, Graph, GraphError, Node, NodeId, NodeStore, Predicate, RedbStore, StorageBackend,
    install_standard_modules,
};
use serde_json::{Map, Value, json};

use super::Commands;

// =============================================================================
// OUTPUT
// =============================================================================

/// Result of one command.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Nodes(Vec<Node>),
    Node(Node),
    Modules(Vec<(String, NodeId)>),
    Inserted(NodeId),
    Done(&'static str),
}

impl Output {
    /// Machine-readable form used by `--json-mode`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Nodes(nodes) => Value::Array(nodes.iter().cloned().map(Node::into_value).collect()),
            Self::Node(node) => node.clone().into_value(),
            Self::Modules(modules) => {
                let map: Map<String, Value> = modules
                    .iter()
                    .map(|(name, id)| (name.clone(), id.to_value()))
                    .collect();
                Value::Object(map)
            }
            Self::Inserted(id) => json!({"status": "ok", "id": id.to_value()}),
            Self::Done(message) => json!({"status": "ok", "message": message}),
        }
    }
}

/// Print a command result to stdout.
pub fn print_output(output: &Output, json_mode: bool, quiet: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&output.to_json()).unwrap_or_default()
        );
        return;
    }

    match output {
        Output::Nodes(nodes) => {
            for node in nodes {
                println!("{}", node);
            }
        }
        Output::Node(node) => println!(
            "{}",
            serde_json::to_string_pretty(node.as_map()).unwrap_or_default()
        ),
        Output::Modules(modules) => {
            for (name, id) in modules {
                println!("{:<16} {}", name, id);
            }
        }
        Output::Inserted(id) => println!("{}", id),
        Output::Done(message) => {
            if !quiet {
                println!("{}", message);
            }
        }
    }
}

// =============================================================================
// STORAGE
// =============================================================================

/// Open the configured store and wrap it in a graph.
pub fn open_graph(config: &AppConfig) -> Result<Graph, GraphError> {
    let ids = config.graph.allocator();
    let path = &config.storage.database;
    let store = match config.storage.backend {
        BackendKind::File => StorageBackend::File(FileStore::open(path, ids)?),
        BackendKind::Redb => StorageBackend::Redb(RedbStore::open(path, ids)?),
    };
    Graph::open(store, config.graph)
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run one command against an open graph.
pub fn run<S: NodeStore>(graph: &mut Graph<S>, command: &Commands) -> Result<Output, GraphError> {
    match command {
        Commands::Clear { standard } => cmd_clear(graph, *standard),
        Commands::Bootstrap => cmd_bootstrap(graph),
        Commands::Ls { filter } => cmd_ls(graph, filter.as_deref()),
        Commands::Get { id } => cmd_get(graph, id),
        Commands::Add { data } => {
            let data = data
                .as_deref()
                .ok_or_else(|| GraphError::Structural("no node data given".to_string()))?;
            cmd_add(graph, data)
        }
        Commands::Update { data } => cmd_update(graph, data),
        Commands::Rm { id } => cmd_rm(graph, id),
        Commands::Modules => Ok(cmd_modules(graph)),
    }
}

fn parse_id<S: NodeStore>(graph: &Graph<S>, raw: &str) -> Result<NodeId, GraphError> {
    let raw = raw.trim();
    graph
        .store()
        .allocator()
        .parse_key(raw)
        .ok_or_else(|| GraphError::NotAnId(raw.to_string()))
}

fn parse_node(raw: &str) -> Result<Node, GraphError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| GraphError::SerializationError(format!("Invalid JSON: {}", e)))?;
    Node::from_value(value)
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Wipe the graph.
pub fn cmd_clear<S: NodeStore>(graph: &mut Graph<S>, standard: bool) -> Result<Output, GraphError> {
    graph.clear()?;
    if standard {
        install_standard_modules(graph)?;
        return Ok(Output::Done("graph cleared, standard modules installed"));
    }
    Ok(Output::Done("graph cleared"))
}

/// Install attribute_id, link, and type.
pub fn cmd_bootstrap<S: NodeStore>(graph: &mut Graph<S>) -> Result<Output, GraphError> {
    install_standard_modules(graph)?;
    Ok(cmd_modules(graph))
}

/// List nodes matching an optional JSON predicate.
pub fn cmd_ls<S: NodeStore>(graph: &Graph<S>, filter: Option<&str>) -> Result<Output, GraphError> {
    let predicate = filter
        .map(|raw| {
            serde_json::from_str::<Predicate>(raw)
                .map_err(|e| GraphError::SerializationError(format!("Invalid predicate: {}", e)))
        })
        .transpose()?;
    Ok(Output::Nodes(graph.find(predicate.as_ref(), None)?))
}

/// Show one node.
pub fn cmd_get<S: NodeStore>(graph: &Graph<S>, id: &str) -> Result<Output, GraphError> {
    let id = parse_id(graph, id)?;
    Ok(Output::Node(graph.get(&id)?))
}

/// Insert a node given as JSON.
pub fn cmd_add<S: NodeStore>(graph: &mut Graph<S>, data: &str) -> Result<Output, GraphError> {
    let id = graph.insert(parse_node(data)?)?;
    Ok(Output::Inserted(id))
}

/// Replace a node given as JSON with its id.
pub fn cmd_update<S: NodeStore>(graph: &mut Graph<S>, data: &str) -> Result<Output, GraphError> {
    graph.update(parse_node(data)?)?;
    Ok(Output::Done("node updated"))
}

/// Remove a node.
pub fn cmd_rm<S: NodeStore>(graph: &mut Graph<S>, id: &str) -> Result<Output, GraphError> {
    let id = parse_id(graph, id)?;
    graph.remove(&id)?;
    Ok(Output::Done("node removed"))
}

/// Registered modules by name.
pub fn cmd_modules<S: NodeStore>(graph: &Graph<S>) -> Output {
    Output::Modules(
        graph
            .modules()
            .iter()
            .map(|(name, id)| (name.clone(), id.clone()))
            .collect(),
    )
}
