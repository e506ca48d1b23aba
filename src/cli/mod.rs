//! CLI module for Treeline.
//!
//! With no subcommand, `treeline` runs a full ingestion of the configured
//! root. Subcommands:
//! - `init`: Create the graph schema constraints and exit

mod ingest;
mod init;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::Result;

use crate::config::{Config, GraphConfig};
use crate::graph::backends::neo4j::Neo4jClient;

/// Treeline - Code Intelligence Graph
#[derive(Parser)]
#[command(name = "treeline")]
#[command(about = "Extract functions and classes from a source tree into a graph store")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory to scan (overrides `ingest.root`)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the graph schema constraints
    Init,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> Result<()> {
        match self.command {
            Some(Command::Init) => self.run_init().await,
            None => self.run_ingest().await,
        }
    }

    /// Loads configuration and applies command-line overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(root) = &self.root {
            config.ingest.root = root.clone();
        }
        config.validate()?;
        tracing::debug!(backend = ?config.graph.backend, root = %config.ingest.root.display(), "Loaded configuration");
        Ok(config)
    }
}

/// Connects to Neo4j with the configured credentials.
async fn connect_neo4j(config: &GraphConfig) -> Result<Neo4jClient> {
    tracing::info!("Connecting to Neo4j at {}", config.uri);
    let client = Neo4jClient::connect(
        &config.uri,
        &config.user,
        config.password.as_deref().unwrap_or(""),
    )
    .await
    .map_err(|e| color_eyre::eyre::eyre!("Failed to connect: {}", e))?;
    tracing::info!("Connected to Neo4j");
    Ok(client)
}
