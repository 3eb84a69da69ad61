// SPDX-License-Identifier: MIT OR Apache-2.0
//! `nodeflow` - evaluate math graphs from the command line.
//!
//! Graphs are the JSON node maps produced by an editor session. Every command
//! reconciles the loaded graph against the built-in math schema first, so
//! files saved by older schema versions still load.
//!
//! ```bash
//! nodeflow eval samples/product.json --settings samples/settings.ron
//! nodeflow reconcile samples/product.json
//! nodeflow types
//! ```

use clap::{Parser, Subcommand};
use nodeflow_graph::graphs::math::{math_registry, MathHost};
use nodeflow_graph::{
    reconcile_nodes, transition, Context, EditorSettings, EvaluationError, Graph, GraphAction, Registry, RegistryError,
    RootEngine, SettingsError,
};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "nodeflow")]
#[command(about = "Evaluate node graphs built on the math schema", long_about = None)]
struct Cli {
    /// Editor settings file (RON)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the root node and print its input values as JSON
    Eval {
        /// Graph file (JSON)
        graph: PathBuf,

        /// Evaluate this node instead of the flagged root
        #[arg(long)]
        root: Option<String>,

        /// Host context passed to callbacks (JSON)
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the graph after reconciling it against the schema
    Reconcile {
        /// Graph file (JSON)
        graph: PathBuf,
    },

    /// List the node types offered in the add-node menu
    Types,

    /// Write default settings to a file
    InitSettings {
        /// Destination (RON)
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Failed to build registry: {0}")]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nodeflow_graph=info,nodeflow=info"));

    // stdout carries the JSON result
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => println!("{output}"),
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<String, CliError> {
    let settings = match &cli.settings {
        Some(path) => EditorSettings::load(path)?,
        None => EditorSettings::default(),
    };
    tracing::debug!("Settings: {settings:?}");

    match cli.command {
        Commands::Eval { graph, root, context } => {
            let registry = math_registry()?;
            let context = match context {
                Some(json) => serde_json::from_str(&json)?,
                None => Context::Null,
            };
            let graph = load_graph(&graph, &registry, &settings, &context)?;
            evaluate(&graph, &registry, &settings, root, context)
        }
        Commands::Reconcile { graph } => {
            let registry = math_registry()?;
            let graph = load_graph(&graph, &registry, &settings, &Context::Null)?;
            Ok(serde_json::to_string_pretty(&graph)?)
        }
        Commands::Types => {
            let registry = math_registry()?;
            Ok(list_types(&registry))
        }
        Commands::InitSettings { path } => {
            settings.save(&path)?;
            Ok(format!("Wrote {}", path.display()))
        }
    }
}

fn load_graph(path: &Path, registry: &Registry, settings: &EditorSettings, context: &Context) -> Result<Graph, CliError> {
    let content = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    prepare_graph(&content, registry, settings, context)
}

/// Parse a graph, give seed nodes fresh IDs and reconcile against the registry
fn prepare_graph(
    content: &str,
    registry: &Registry,
    settings: &EditorSettings,
    context: &Context,
) -> Result<Graph, CliError> {
    let graph: Graph = serde_json::from_str(content)?;
    tracing::info!("Loaded graph with {} nodes", graph.node_count());

    let mut ids = settings.id_generator();
    let mut env = settings.mutator_env(registry, &mut ids).with_context(context);
    let graph = transition(&graph, GraphAction::HydrateDefaultNodes, &mut env).graph;

    let reconciled = reconcile_nodes(&graph, registry, context);
    if reconciled != graph {
        tracing::info!("Graph updated to match the current schema");
    }
    for (output, input) in reconciled.asymmetric_edges() {
        tracing::warn!(
            "Edge {}.{} -> {}.{} is recorded on one side only",
            output.node_id,
            output.port_name,
            input.node_id,
            input.port_name
        );
    }
    Ok(reconciled)
}

fn evaluate(
    graph: &Graph,
    registry: &Registry,
    settings: &EditorSettings,
    root: Option<String>,
    context: Context,
) -> Result<String, CliError> {
    let mut options = settings.resolve_options().context(context);
    if let Some(root) = root {
        options = options.root_node_id(root);
    }
    let values = RootEngine::new(registry, MathHost).resolve_root_node(graph, &options)?;
    Ok(serde_json::to_string_pretty(&values)?)
}

fn list_types(registry: &Registry) -> String {
    registry
        .addable_node_types()
        .iter()
        .map(|t| format!("{:<10} {:<12} {}", t.type_name, t.label, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}
