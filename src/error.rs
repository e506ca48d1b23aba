//! Application error types.

use std::path::PathBuf;

use thiserror::Error;

/// Application-level errors for Treeline.
///
/// `Read` and `Parse` are recovered by the pipeline (the file is skipped).
/// `Embedding` and `Write` are fatal to the run.
#[derive(Error, Debug)]
pub enum AppError {
    // Graph store errors
    #[error("Neo4j connection error: {0}")]
    Connection(#[from] neo4rs::Error),

    #[error("Graph query error: {message}")]
    Query { message: String, query: String },

    // Ingestion errors
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    // Embedding errors
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Graph write failed for '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: Box<AppError>,
    },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true for per-file errors the pipeline logs and skips.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Read { .. } | AppError::Parse { .. })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Embedding(err.to_string())
    }
}
