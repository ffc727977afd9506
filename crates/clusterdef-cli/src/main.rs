//! clusterdef - inspect cluster definitions
//!
//! Loads cluster definitions from the cluster path and prints what each
//! server will receive at provisioning time, as JSON on stdout. Logs go to
//! stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clusterdef::{Engine, EngineConfig, RoleImplications, SliceSpec};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// clusterdef CLI
#[derive(Parser)]
#[command(name = "clusterdef")]
#[command(about = "Layered cluster / facet / server definitions", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CLUSTERDEF_CONFIG")]
    config: Option<String>,

    /// Cluster definition directory (repeatable; replaces the configured path)
    #[arg(long = "cluster-path", value_name = "DIR")]
    cluster_path: Vec<PathBuf>,

    /// Log level (overrides the configured level)
    #[arg(long, env = "CLUSTERDEF_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List clusters found on the cluster path
    List,

    /// Print the servers of a cluster, optionally narrowed to a facet and slice
    Show {
        /// Cluster name
        cluster: String,

        /// Facet name; every facet when omitted
        facet: Option<String>,

        /// Server indexes, e.g. "0-2,5"; every server when omitted
        slice: Option<String>,
    },

    /// Print a cluster's facets, instance counts and run lists
    Describe {
        /// Cluster name
        cluster: String,
    },

    /// Import a provisioning request as a cluster definition
    Import {
        /// Request file (JSON)
        request: PathBuf,

        /// Replace an existing definition of the same name
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        EngineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if !cli.cluster_path.is_empty() {
        config.cluster_path = cli.cluster_path.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    init_tracing(&config);
    tracing::debug!(cluster_path = ?config.cluster_path, "Starting clusterdef");

    let engine = Engine::with_implications(config, RoleImplications::standard());
    let output = run(&engine, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(config: &EngineConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run(engine: &Engine, command: Commands) -> Result<serde_json::Value> {
    match command {
        Commands::List => {
            let names = engine.available_clusters()?;
            Ok(json!(names))
        }
        Commands::Show {
            cluster,
            facet,
            slice,
        } => {
            let spec = match slice.as_deref() {
                Some(text) => SliceSpec::parse(text)?,
                None => SliceSpec::All,
            };
            let servers = engine
                .slice(&cluster, facet.as_deref(), &spec)
                .with_context(|| format!("Failed to resolve servers of cluster '{cluster}'"))?;
            Ok(serde_json::to_value(servers)?)
        }
        Commands::Describe { cluster } => {
            let handle = engine.load_cluster(&cluster)?;
            let summary = handle.read().summary();
            Ok(serde_json::to_value(summary)?)
        }
        Commands::Import { request, overwrite } => {
            let handle = engine
                .import_definition(&request, overwrite)
                .with_context(|| format!("Failed to import {}", request.display()))?;
            let cluster = handle.read();
            let imported = json!({
                "imported": cluster.name(),
                "source": cluster.source(),
                "facets": cluster.facet_names(),
            });
            Ok(imported)
        }
    }
}
