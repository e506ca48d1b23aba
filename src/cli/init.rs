//! Init command handler.

use color_eyre::Result;

use crate::config::GraphBackend;
use crate::graph::backends::memory::MemoryGraph;
use crate::graph::GraphClient;
use crate::repositories::CodeGraphRepository;

use super::{connect_neo4j, App};

impl App {
    /// Run the init command to create the schema constraints.
    pub async fn run_init(&self) -> Result<()> {
        let config = self.load_config()?;

        match config.graph.backend {
            GraphBackend::Neo4j => ensure_schema(connect_neo4j(&config.graph).await?).await,
            GraphBackend::Memory => {
                tracing::info!("Memory backend selected; schema exists only for this process");
                ensure_schema(MemoryGraph::new()).await
            }
        }
    }
}

async fn ensure_schema<C: GraphClient>(client: C) -> Result<()> {
    tracing::info!("Ensuring schema constraints...");
    CodeGraphRepository::new(client)
        .ensure_schema()
        .await
        .map_err(|e| color_eyre::eyre::eyre!("Schema setup failed: {}", e))?;
    tracing::info!("Schema ready");
    Ok(())
}
