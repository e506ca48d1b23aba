//! Ingestion pipeline.
//!
//! `Discovering → Parsing → Upserting → Done | Failed`
//!
//! Parsing runs up to `concurrency` read+parse tasks at once and keeps
//! discovery order. Embedding and upserting are sequential: entities are
//! embedded one at a time, in file order, into a running batch that is
//! flushed whenever it reaches `batch_size`. A flush regroups the batch by
//! file and upserts each group in its own transaction.

use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use futures::StreamExt;
use tokio::task::JoinError;

use crate::config::IngestConfig;
use crate::error::AppError;
use crate::graph::GraphClient;
use crate::models::{Entity, ParsedFile};
use crate::repositories::CodeGraphRepository;
use crate::services::blob;
use crate::services::discovery::{self, DiscoveredFile, FileFilter};
use crate::services::embedding::Embedder;
use crate::services::extractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Parsing,
    Upserting,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Discovering => "discovering",
            Phase::Parsing => "parsing",
            Phase::Upserting => "upserting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a completed run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub files_discovered: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    pub entities_written: usize,
    /// Entity count of each flush, in order.
    pub flush_sizes: Vec<usize>,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files scanned ({} parsed, {} skipped), {} entities written in {} flushes, {:.2?}",
            self.files_discovered,
            self.files_parsed,
            self.files_skipped,
            self.entities_written,
            self.flush_sizes.len(),
            self.elapsed
        )
    }
}

type Pending = (String, Entity, Vec<f32>);

/// Drives one ingestion run over a source tree.
pub struct Pipeline<C, E> {
    repository: CodeGraphRepository<C>,
    embedder: E,
    settings: IngestConfig,
}

impl<C: GraphClient, E: Embedder> Pipeline<C, E> {
    pub fn new(repository: CodeGraphRepository<C>, embedder: E, settings: IngestConfig) -> Self {
        Self {
            repository,
            embedder,
            settings,
        }
    }

    pub fn repository(&self) -> &CodeGraphRepository<C> {
        &self.repository
    }

    /// Discovers files under the configured root and ingests them.
    pub async fn run(&self) -> Result<RunSummary, AppError> {
        let started = Instant::now();
        tracing::info!(phase = %Phase::Discovering, root = %self.settings.root.display(), "Scanning");

        let files = match self.discover().await {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(phase = %Phase::Failed, error = %e, "Discovery failed");
                return Err(e);
            }
        };
        self.ingest(files, started).await
    }

    /// Ingests an explicit file list, skipping discovery.
    pub async fn run_files(&self, files: Vec<DiscoveredFile>) -> Result<RunSummary, AppError> {
        self.ingest(files, Instant::now()).await
    }

    async fn discover(&self) -> Result<Vec<DiscoveredFile>, AppError> {
        let filter = FileFilter::new(&self.settings.include, &self.settings.exclude)?;
        let root = self.settings.root.clone();
        tokio::task::spawn_blocking(move || discovery::discover(&root, &filter))
            .await
            .map_err(|e| AppError::Internal(format!("discovery task failed: {}", e)))?
    }

    async fn ingest(
        &self,
        files: Vec<DiscoveredFile>,
        started: Instant,
    ) -> Result<RunSummary, AppError> {
        let mut summary = RunSummary {
            files_discovered: files.len(),
            ..RunSummary::default()
        };

        let result = self.ingest_inner(files, &mut summary).await;
        summary.elapsed = started.elapsed();

        match result {
            Ok(()) => {
                tracing::info!(phase = %Phase::Done, "{}", summary);
                Ok(summary)
            }
            Err(e) => {
                tracing::error!(
                    phase = %Phase::Failed,
                    entities_written = summary.entities_written,
                    error = %e,
                    "Ingestion aborted"
                );
                Err(e)
            }
        }
    }

    async fn ingest_inner(
        &self,
        files: Vec<DiscoveredFile>,
        summary: &mut RunSummary,
    ) -> Result<(), AppError> {
        self.repository.ensure_schema().await?;

        tracing::info!(
            phase = %Phase::Parsing,
            files = files.len(),
            concurrency = self.settings.concurrency,
            "Parsing"
        );
        let parsed = self.parse_all(files, summary).await?;

        tracing::info!(
            phase = %Phase::Upserting,
            files = parsed.len(),
            batch_size = self.settings.batch_size,
            "Embedding and upserting"
        );
        self.upsert_all(parsed, summary).await
    }

    /// Parses every file; unreadable and malformed files are skipped.
    async fn parse_all(
        &self,
        files: Vec<DiscoveredFile>,
        summary: &mut RunSummary,
    ) -> Result<Vec<ParsedFile>, AppError> {
        let results: Vec<Result<ParsedFile, AppError>> = futures::stream::iter(files)
            .map(parse_file)
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut parsed = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(file) => {
                    summary.files_parsed += 1;
                    parsed.push(file);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(error = %e, "Skipping file");
                    summary.files_skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(parsed)
    }

    async fn upsert_all(
        &self,
        parsed: Vec<ParsedFile>,
        summary: &mut RunSummary,
    ) -> Result<(), AppError> {
        let batch_size = self.settings.batch_size.max(1);
        let mut batch: Vec<Pending> = Vec::with_capacity(batch_size);

        for file in parsed {
            if file.entities.is_empty() {
                tracing::debug!(path = %file.path, language = %file.language, "No entities");
                continue;
            }
            for entity in file.entities {
                let text = blob::compose(&entity, &file.path);
                let vector = self.embedder.embed(&text).await?;
                if vector.len() != self.embedder.dimensions() {
                    return Err(AppError::Embedding(format!(
                        "vector for {} has {} dimensions, expected {}",
                        entity.uid(&file.path),
                        vector.len(),
                        self.embedder.dimensions()
                    )));
                }
                batch.push((file.path.clone(), entity, vector));

                if batch.len() >= batch_size {
                    self.flush(&mut batch, summary).await?;
                }
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, summary).await?;
        }
        Ok(())
    }

    async fn flush(
        &self,
        batch: &mut Vec<Pending>,
        summary: &mut RunSummary,
    ) -> Result<(), AppError> {
        let size = batch.len();
        let groups = group_by_file(std::mem::take(batch));
        tracing::debug!(entities = size, files = groups.len(), "Flushing batch");

        for (path, entities) in groups {
            self.repository.upsert_batch(&path, &entities).await?;
            summary.entities_written += entities.len();
        }
        summary.flush_sizes.push(size);
        Ok(())
    }
}

/// Reads and parses one file off the async runtime's worker threads.
async fn parse_file(file: DiscoveredFile) -> Result<ParsedFile, AppError> {
    let bytes = tokio::fs::read(&file.absolute)
        .await
        .map_err(|source| AppError::Read {
            path: file.absolute.clone(),
            source,
        })?;

    let absolute = file.absolute.clone();
    let spec = file.spec;
    let entities =
        tokio::task::spawn_blocking(move || extractor::extract_source(&absolute, spec, bytes))
            .await
            .map_err(|e| parse_task_failed(&file.absolute, e))??;

    tracing::debug!(path = %file.path, language = %spec.language, entities = entities.len(), "Parsed");
    Ok(ParsedFile {
        path: file.path,
        language: spec.language,
        entities,
    })
}

/// A parser that panics costs only its own file.
fn parse_task_failed(path: &Path, error: JoinError) -> AppError {
    AppError::Parse {
        path: path.to_path_buf(),
        reason: format!("parser task failed: {}", error),
    }
}

/// Splits a batch into per-file groups in first-appearance order.
fn group_by_file(batch: Vec<Pending>) -> Vec<(String, Vec<(Entity, Vec<f32>)>)> {
    let mut groups: Vec<(String, Vec<(Entity, Vec<f32>)>)> = Vec::new();
    for (path, entity, vector) in batch {
        match groups.iter_mut().find(|(owner, _)| *owner == path) {
            Some((_, group)) => group.push((entity, vector)),
            None => groups.push((path, vec![(entity, vector)])),
        }
    }
    groups
}
