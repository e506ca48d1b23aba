//! Ingest command handler (the default command).

use color_eyre::{eyre::eyre, Result};

use crate::config::{Config, GraphBackend};
use crate::graph::backends::memory::MemoryGraph;
use crate::graph::GraphClient;
use crate::repositories::CodeGraphRepository;
use crate::services::{EmbeddingProvider, Pipeline};

use super::{connect_neo4j, App};

impl App {
    /// Run a full discovery → parse → embed → upsert pass.
    pub async fn run_ingest(&self) -> Result<()> {
        let config = self.load_config()?;
        let embedder = EmbeddingProvider::from_config(&config.embedding)?;

        match config.graph.backend {
            GraphBackend::Neo4j => {
                let client = connect_neo4j(&config.graph).await?;
                ingest(client, embedder, &config).await
            }
            GraphBackend::Memory => {
                tracing::info!("Memory backend selected; nothing will be persisted");
                ingest(MemoryGraph::new(), embedder, &config).await
            }
        }
    }
}

async fn ingest<C: GraphClient>(
    client: C,
    embedder: EmbeddingProvider,
    config: &Config,
) -> Result<()> {
    let pipeline = Pipeline::new(
        CodeGraphRepository::new(client),
        embedder,
        config.ingest.clone(),
    );

    // Dropping the run abandons any open transaction; earlier commits stay
    let summary = tokio::select! {
        result = pipeline.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted; batches committed so far are kept");
            return Err(eyre!("ingestion interrupted"));
        }
    };

    let stats = pipeline.repository().stats().await?;
    tracing::info!("Graph now holds {}", stats);
    if stats.containment_violations > 0 {
        tracing::warn!(
            count = stats.containment_violations,
            "Entities without exactly one owning file"
        );
    }

    println!("{}", summary);
    Ok(())
}
