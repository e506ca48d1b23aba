//! Code graph repository: transactional upserts of files and entities.

use std::fmt;

use chrono::Utc;

use crate::error::AppError;
use crate::graph::{CypherExecutor, GraphClient, QueryExt, Transaction};
use crate::models::{Entity, EntityRecord};
use crate::repositories::statements;

/// Node and edge counts, plus the number of entities breaking the
/// one-owner containment rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub files: i64,
    pub entities: i64,
    pub edges: i64,
    pub containment_violations: i64,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files, {} entities, {} containment edges",
            self.files, self.entities, self.edges
        )
    }
}

/// Repository for SourceFile and Entity nodes.
#[derive(Clone)]
pub struct CodeGraphRepository<C> {
    client: C,
}

impl<C: GraphClient> CodeGraphRepository<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Creates the uniqueness constraints if they are missing.
    ///
    /// Runs outside any transaction: Neo4j refuses schema changes in a
    /// transaction that also writes data.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        for constraint in statements::SCHEMA_CONSTRAINTS {
            self.client.query(constraint).run().await?;
        }
        tracing::debug!("Schema constraints in place");
        Ok(())
    }

    /// Writes one file's entities in a single transaction.
    ///
    /// Either the file node and every entity commit together, or the
    /// transaction is rolled back and a [`AppError::Write`] names the file.
    pub async fn upsert_batch(
        &self,
        path: &str,
        entities: &[(Entity, Vec<f32>)],
    ) -> Result<(), AppError> {
        let write_error = |source: AppError| AppError::Write {
            path: path.to_string(),
            source: Box::new(source),
        };
        let now = Utc::now().to_rfc3339();

        let txn = self.client.begin().await.map_err(write_error)?;
        match write_file(&txn, path, entities, &now).await {
            Ok(()) => {
                txn.commit().await.map_err(write_error)?;
                tracing::debug!(path = %path, entities = entities.len(), "Committed file batch");
                Ok(())
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "File batch failed, rolling back");
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(path = %path, error = %rollback_err, "Rollback failed");
                }
                Err(write_error(e))
            }
        }
    }

    /// Current node and edge counts.
    pub async fn stats(&self) -> Result<GraphStats, AppError> {
        Ok(GraphStats {
            files: self.count(statements::COUNT_FILES).await?,
            entities: self.count(statements::COUNT_ENTITIES).await?,
            edges: self.count(statements::COUNT_CONTAINS).await?,
            containment_violations: self
                .count(statements::COUNT_CONTAINMENT_VIOLATIONS)
                .await?,
        })
    }

    /// Finds an entity by uid.
    pub async fn find_entity(&self, uid: &str) -> Result<Option<EntityRecord>, AppError> {
        let row = self
            .client
            .query(statements::FIND_ENTITY)
            .param("uid", uid)
            .fetch_one()
            .await?;

        match row {
            Some(row) => Ok(Some(row.get("entity")?)),
            None => Ok(None),
        }
    }

    /// Uids of every entity contained by `path`, sorted.
    pub async fn entity_uids(&self, path: &str) -> Result<Vec<String>, AppError> {
        let rows = self
            .client
            .query(statements::ENTITY_UIDS_FOR_FILE)
            .param("path", path)
            .fetch_all()
            .await?;

        rows.iter().map(|row| row.get("uid")).collect()
    }

    async fn count(&self, cypher: &str) -> Result<i64, AppError> {
        let row = self.client.query(cypher).fetch_one().await?;
        match row {
            Some(row) => Ok(row.get_opt("count")?.unwrap_or(0)),
            None => Ok(0),
        }
    }
}

async fn write_file<T: CypherExecutor>(
    txn: &T,
    path: &str,
    entities: &[(Entity, Vec<f32>)],
    now: &str,
) -> Result<(), AppError> {
    txn.query(statements::UPSERT_FILE)
        .param("path", path)
        .param("now", now)
        .run()
        .await?;

    for (entity, embedding) in entities {
        txn.query(statements::UPSERT_ENTITY)
            .param("path", path)
            .param("uid", entity.uid(path))
            .param("now", now)
            .param_raw("props", entity.properties(path, embedding))
            .run()
            .await?;
    }
    Ok(())
}
