//! Ingestion services: extraction, embedding and the pipeline that ties
//! them to the graph repository.

pub mod blob;
pub mod discovery;
pub mod embedding;
pub mod extractor;
pub mod pipeline;

pub use discovery::{discover, DiscoveredFile, FileFilter};
pub use embedding::{Embedder, EmbeddingProvider, HashEmbedder, RemoteEmbedder};
pub use pipeline::{Phase, Pipeline, RunSummary};
