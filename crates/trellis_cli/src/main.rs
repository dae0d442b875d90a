//! Trellis CLI
//!
//! Compile a node's catalog from a manifest directory, or check that the
//! manifests load.

#![warn(missing_docs)]
#![warn(clippy::all)]

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::Result;
use color_eyre::eyre::eyre;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_compiler::{Compiler, CompilerConfig};
use trellis_core::Node;
use trellis_types::{Definition, DirectorySources, Environment, Environments, TypeCollection};

const LOG_ENV: &str = "TRELLIS_LOG";
const DEFAULT_LOG_FILTER: &str = "trellis_cli=info,trellis_compiler=info,trellis_types=info";

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis - compile configuration manifests into node catalogs", long_about = None)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the catalog for one node and print it as JSON
    Compile {
        /// Directory of manifest files
        #[arg(short, long)]
        manifests: PathBuf,
        /// Node name
        #[arg(short, long)]
        node: String,
        /// Node fact as key=value, may be repeated
        #[arg(short, long = "fact", value_parser = parse_fact)]
        facts: Vec<(String, String)>,
        /// Environment to compile in
        #[arg(short, long)]
        environment: Option<String>,
        /// Compiler configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load the manifests and report their definitions
    Check {
        /// Directory of manifest files
        #[arg(short, long)]
        manifests: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Commands::Compile {
            manifests,
            node,
            facts,
            environment,
            config,
        } => {
            let config = match config {
                Some(path) => CompilerConfig::from_file(&path)?,
                None => CompilerConfig::default(),
            };
            let json = compile(&manifests, &node, facts, environment, config)?;
            println!("{json}");
            Ok(())
        }
        Commands::Check { manifests } => {
            println!("{}", check(&manifests)?);
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn parse_fact(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{text}'")),
    }
}

/// Compile one node and render its catalog as JSON
fn compile(
    manifests: &Path,
    node_name: &str,
    facts: Vec<(String, String)>,
    environment: Option<String>,
    config: CompilerConfig,
) -> Result<String> {
    let environment = environment.unwrap_or_else(|| config.default_environment.clone());
    let sources = Arc::new(DirectorySources::new(manifests));
    let environments =
        Environments::new(environment.clone()).with(Environment::new(environment.clone(), sources));
    let compiler = Compiler::new(environments, config);

    let mut node = Node::new(node_name).with_environment(environment);
    for (key, value) in facts {
        node = node.with_fact(key, value);
    }

    let catalog = compiler.compile(&node, None)?;
    info!(
        node = %catalog.node,
        resources = catalog.len(),
        edges = catalog.edges().len(),
        "Catalog ready"
    );
    Ok(catalog.to_json()?)
}

/// Load a manifest directory and summarize what it defines
fn check(manifests: &Path) -> Result<String> {
    if !manifests.is_dir() {
        return Err(eyre!("manifest directory {} does not exist", manifests.display()));
    }
    let collection = TypeCollection::load(Arc::new(DirectorySources::new(manifests)))?;

    let mut lines = vec![format!(
        "{} manifests, {} definitions",
        collection.manifests().len(),
        collection.definitions().len()
    )];
    for definition in collection.definitions().values() {
        let kind = match definition {
            Definition::Class(_) => "class",
            Definition::Define(_) => "define",
        };
        lines.push(format!("  {kind} {}", definition.name()));
    }
    Ok(lines.join("\n"))
}
