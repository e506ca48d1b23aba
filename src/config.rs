//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/treeline/config.toml` (XDG) or platform config dir
//! 3. Project config: `.treeline.toml`
//! 4. Conventional environment variables (`NEO4J_URI`, `OPENAI_API_KEY`, ...)
//! 5. Prefixed environment variables: `TREELINE_<SECTION>__<KEY>`
//!
//! # Example
//!
//! ```toml
//! [graph]
//! backend = "neo4j"
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! password = "secret"
//!
//! [embedding]
//! model = "text-embedding-3-small"
//! dimensions = 1536
//!
//! [ingest]
//! root = "."
//! batch_size = 200
//! concurrency = 4
//! exclude = ["**/vendor/**"]
//! ```
//!
//! Leaving `embedding.api_key` unset selects the deterministic offline
//! embedder.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use crate::error::AppError;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Unprefixed environment variables and the config keys they populate.
const CONVENTIONAL_ENV: &[(&str, &str)] = &[
    ("NEO4J_URI", "graph.uri"),
    ("NEO4J_USER", "graph.user"),
    ("NEO4J_PASSWORD", "graph.password"),
    ("OPENAI_API_KEY", "embedding.api_key"),
    ("EMBEDDING_MODEL", "embedding.model"),
    ("ROOT_DIR", "ingest.root"),
    ("BATCH_SIZE", "ingest.batch_size"),
    ("PARSE_CONCURRENCY", "ingest.concurrency"),
];

/// Directories that never contain first-party source.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
];

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub embedding: EmbeddingConfig,
    pub ingest: IngestConfig,
}

/// Which graph store implementation to write to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    #[default]
    Neo4j,
    /// In-process store; nothing is persisted. Useful for dry runs.
    Memory,
}

/// Graph store connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    pub user: String,
    pub password: Option<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Neo4j,
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
        }
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// API key for the remote provider. Absent means offline fallback.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    /// Model identifier (e.g., "text-embedding-3-small").
    pub model: String,
    /// Embedding vector dimensions.
    pub dimensions: usize,
    /// Transport timeout for a single embedding request.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Returns the API key when one is configured and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Ingestion run settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory to scan.
    pub root: PathBuf,
    /// Entities accumulated before a flush to the graph.
    pub batch_size: usize,
    /// Maximum parse tasks in flight.
    pub concurrency: usize,
    /// Glob patterns a file must match (empty means every supported file).
    pub include: Vec<String>,
    /// Glob patterns excluded from discovery.
    pub exclude: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            batch_size: 200,
            concurrency: 4,
            include: Vec::new(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load config with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, AppError> {
        let config = Self::figment(&Self::user_config_path(), Path::new(".treeline.toml"))
            .extract()
            .map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Builds the layered provider from explicit file locations.
    pub fn figment(user_config: &Path, project_config: &Path) -> Figment {
        Figment::new()
            // Layer 1: User config (lowest priority; serde fills defaults)
            .merge(Toml::file(user_config))
            // Layer 2: Project config
            .merge(Toml::file(project_config))
            // Layer 3: Conventional variables
            .merge(Env::raw().filter_map(|key| {
                CONVENTIONAL_ENV
                    .iter()
                    .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))
                    .map(|(_, path)| (*path).into())
            }))
            // Layer 4: Prefixed variables (highest priority)
            .merge(Env::prefixed("TREELINE_").split("__"))
    }

    /// Rejects settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.ingest.batch_size == 0 {
            return Err(AppError::Validation("ingest.batch_size must be > 0".into()));
        }
        if self.ingest.concurrency == 0 {
            return Err(AppError::Validation("ingest.concurrency must be > 0".into()));
        }
        if self.embedding.dimensions == 0 {
            return Err(AppError::Validation(
                "embedding.dimensions must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// User config path: ~/.config/treeline/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join("treeline").join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("treeline").join("config.toml"))
            .unwrap_or_default()
    }
}
