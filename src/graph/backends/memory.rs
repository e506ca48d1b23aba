//! In-process graph backend.
//!
//! `MemoryGraph` understands exactly the statements in
//! [`crate::repositories::statements`] and rejects anything else. Writes
//! inside a [`MemoryTransaction`] are buffered and applied atomically on
//! commit, so rollback semantics match a real store.
//!
//! It backs `graph.backend = "memory"` dry runs and the test suite. Paths
//! registered with [`MemoryGraph::fail_writes_for`] make every write that
//! touches them fail, which lets tests exercise the rollback path.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};
use crate::repositories::statements;

/// Statements this backend can interpret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Schema,
    UpsertFile,
    UpsertEntity,
    CountFiles,
    CountEntities,
    CountContains,
    CountViolations,
    FindEntity,
    EntityUids,
}

impl Statement {
    fn classify(cypher: &str) -> Result<Self, AppError> {
        let cypher = cypher.trim();
        let statement = match cypher {
            c if statements::SCHEMA_CONSTRAINTS.contains(&c) => Statement::Schema,
            statements::UPSERT_FILE => Statement::UpsertFile,
            statements::UPSERT_ENTITY => Statement::UpsertEntity,
            statements::COUNT_FILES => Statement::CountFiles,
            statements::COUNT_ENTITIES => Statement::CountEntities,
            statements::COUNT_CONTAINS => Statement::CountContains,
            statements::COUNT_CONTAINMENT_VIOLATIONS => Statement::CountViolations,
            statements::FIND_ENTITY => Statement::FindEntity,
            statements::ENTITY_UIDS_FOR_FILE => Statement::EntityUids,
            _ => {
                return Err(AppError::Query {
                    message: "statement not supported by the memory backend".into(),
                    query: cypher.to_string(),
                })
            }
        };
        Ok(statement)
    }

    fn is_write(self) -> bool {
        matches!(
            self,
            Statement::Schema | Statement::UpsertFile | Statement::UpsertEntity
        )
    }
}

#[derive(Debug, Clone, Default)]
struct GraphState {
    /// path -> created timestamp
    files: BTreeMap<String, JsonValue>,
    /// uid -> full property map
    entities: BTreeMap<String, JsonMap<String, JsonValue>>,
    /// (file path, entity uid)
    contains: BTreeSet<(String, String)>,
}

impl GraphState {
    fn apply(&mut self, statement: Statement, params: &Params) -> Result<(), AppError> {
        match statement {
            Statement::Schema => Ok(()),
            Statement::UpsertFile => {
                let path = str_param(params, "path")?;
                let now = value_param(params, "now")?;
                self.files.entry(path.to_string()).or_insert(now);
                Ok(())
            }
            Statement::UpsertEntity => {
                let path = str_param(params, "path")?;
                let uid = str_param(params, "uid")?;
                let now = value_param(params, "now")?;
                let props = params
                    .get("props")
                    .and_then(JsonValue::as_object)
                    .ok_or_else(|| AppError::Internal("parameter 'props' must be a map".into()))?;

                // MATCH on a missing file yields no rows: nothing is written
                if !self.files.contains_key(path) {
                    return Ok(());
                }

                let created = self
                    .entities
                    .get(uid)
                    .and_then(|node| node.get("created").cloned())
                    .unwrap_or(now);

                let mut node = props.clone();
                node.insert("uid".into(), JsonValue::String(uid.to_string()));
                node.insert("created".into(), created);
                self.entities.insert(uid.to_string(), node);
                self.contains.insert((path.to_string(), uid.to_string()));
                Ok(())
            }
            other => Err(AppError::Internal(format!("{:?} is not a write", other))),
        }
    }

    fn read(&self, statement: Statement, params: &Params) -> Result<Vec<Row>, AppError> {
        let count = |n: usize| vec![Row::single("count", JsonValue::from(n))];
        let rows = match statement {
            Statement::CountFiles => count(self.files.len()),
            Statement::CountEntities => count(self.entities.len()),
            Statement::CountContains => count(self.contains.len()),
            Statement::CountViolations => count(self.containment_violations()),
            Statement::FindEntity => {
                let uid = str_param(params, "uid")?;
                self.entities
                    .get(uid)
                    .map(|node| Row::single("entity", JsonValue::Object(node.clone())))
                    .into_iter()
                    .collect()
            }
            Statement::EntityUids => {
                let path = str_param(params, "path")?;
                self.contains
                    .iter()
                    .filter(|(owner, _)| owner == path)
                    .map(|(_, uid)| Row::single("uid", JsonValue::String(uid.clone())))
                    .collect()
            }
            _ => Vec::new(),
        };
        Ok(rows)
    }

    fn containment_violations(&self) -> usize {
        self.entities
            .iter()
            .filter(|(uid, node)| {
                let owners: Vec<&String> = self
                    .contains
                    .iter()
                    .filter(|(_, owned)| owned == *uid)
                    .map(|(path, _)| path)
                    .collect();
                let recorded = node.get("path").and_then(JsonValue::as_str);
                owners.len() != 1 || recorded != Some(owners[0].as_str())
            })
            .count()
    }
}

fn value_param(params: &Params, name: &str) -> Result<JsonValue, AppError> {
    params
        .get(name)
        .cloned()
        .ok_or_else(|| AppError::Internal(format!("missing parameter '{}'", name)))
}

fn str_param<'p>(params: &'p Params, name: &str) -> Result<&'p str, AppError> {
    params
        .get(name)
        .and_then(JsonValue::as_str)
        .ok_or_else(|| AppError::Internal(format!("parameter '{}' must be a string", name)))
}

fn rows_to_stream(rows: Vec<Row>) -> RowStream<'static> {
    Box::pin(futures::stream::iter(rows.into_iter().map(Ok)))
}

/// In-process graph store. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryGraph {
    state: Arc<Mutex<GraphState>>,
    failing_paths: Arc<Mutex<HashSet<String>>>,
}

impl MemoryGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write whose `path` parameter equals `path` fail.
    pub fn fail_writes_for(&self, path: &str) {
        lock(&self.failing_paths).insert(path.to_string());
    }

    fn check_fault(&self, cypher: &str, params: &Params) -> Result<(), AppError> {
        let Some(path) = params.get("path").and_then(JsonValue::as_str) else {
            return Ok(());
        };
        if lock(&self.failing_paths).contains(path) {
            return Err(AppError::Query {
                message: format!("injected write failure for '{}'", path),
                query: cypher.to_string(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Mutations are single inserts or whole-state swaps; poisoned data is consistent.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl CypherExecutor for MemoryGraph {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let statement = Statement::classify(cypher)?;
        if statement.is_write() {
            self.check_fault(cypher, &params)?;
            lock(&self.state).apply(statement, &params)?;
            return Ok(rows_to_stream(Vec::new()));
        }
        let rows = lock(&self.state).read(statement, &params)?;
        Ok(rows_to_stream(rows))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.execute_cypher(cypher, params).await.map(drop)
    }
}

#[async_trait]
impl GraphClient for MemoryGraph {
    type Tx<'a> = MemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx<'_>, AppError> {
        Ok(MemoryTransaction {
            graph: self.clone(),
            pending: Mutex::new(Vec::new()),
        })
    }
}

/// Buffered transaction over a [`MemoryGraph`].
pub struct MemoryTransaction {
    graph: MemoryGraph,
    pending: Mutex<Vec<(Statement, Params)>>,
}

impl MemoryTransaction {
    /// Committed state with this transaction's pending writes applied.
    fn snapshot(&self) -> Result<GraphState, AppError> {
        let mut state = lock(&self.graph.state).clone();
        for (statement, params) in lock(&self.pending).iter() {
            state.apply(*statement, params)?;
        }
        Ok(state)
    }
}

#[async_trait]
impl CypherExecutor for MemoryTransaction {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let statement = Statement::classify(cypher)?;
        if statement.is_write() {
            self.graph.check_fault(cypher, &params)?;
            lock(&self.pending).push((statement, params));
            return Ok(rows_to_stream(Vec::new()));
        }
        let rows = self.snapshot()?.read(statement, &params)?;
        Ok(rows_to_stream(rows))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.execute_cypher(cypher, params).await.map(drop)
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn commit(self) -> Result<(), AppError> {
        let mut state = lock(&self.graph.state);
        let mut next = state.clone();
        for (statement, params) in lock(&self.pending).iter() {
            next.apply(*statement, params)?;
        }
        *state = next;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        lock(&self.pending).clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::QueryExt;
    use serde_json::json;

    async fn count(graph: &MemoryGraph, cypher: &str) -> i64 {
        let row = graph.query(cypher).fetch_one().await.unwrap().unwrap();
        row.get("count").unwrap()
    }

    #[tokio::test]
    async fn test_unknown_statement_rejected() {
        let graph = MemoryGraph::new();
        let result = graph.query("MATCH (n) DETACH DELETE n").run().await;
        assert!(matches!(result, Err(AppError::Query { .. })));
    }

    #[tokio::test]
    async fn test_rollback_discards_pending_writes() {
        let graph = MemoryGraph::new();
        let txn = graph.begin().await.unwrap();
        txn.query(statements::UPSERT_FILE)
            .param("path", "a.py")
            .param("now", "2026-01-01T00:00:00Z")
            .run()
            .await
            .unwrap();

        // Visible inside the transaction, invisible outside
        let inside = txn
            .query(statements::COUNT_FILES)
            .fetch_one()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inside.get::<i64>("count").unwrap(), 1);
        assert_eq!(count(&graph, statements::COUNT_FILES).await, 0);

        txn.rollback().await.unwrap();
        assert_eq!(count(&graph, statements::COUNT_FILES).await, 0);
    }

    #[tokio::test]
    async fn test_entity_requires_existing_file() {
        let graph = MemoryGraph::new();
        graph
            .query(statements::UPSERT_ENTITY)
            .param("path", "missing.py")
            .param("uid", "missing.py:1:2:Function")
            .param("now", "2026-01-01T00:00:00Z")
            .param("props", json!({"path": "missing.py"}))
            .run()
            .await
            .unwrap();
        assert_eq!(count(&graph, statements::COUNT_ENTITIES).await, 0);
    }

    #[tokio::test]
    async fn test_fault_injection_by_path() {
        let graph = MemoryGraph::new();
        graph.fail_writes_for("bad.py");
        let result = graph
            .query(statements::UPSERT_FILE)
            .param("path", "bad.py")
            .param("now", "2026-01-01T00:00:00Z")
            .run()
            .await;
        assert!(result.is_err());
    }
}
