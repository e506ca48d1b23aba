//! Neo4j backend over Bolt using `neo4rs`.
//!
//! # Example
//!
//! ```ignore
//! use treeline::graph::backends::neo4j::Neo4jClient;
//! use treeline::graph::QueryExt;
//!
//! let client = Neo4jClient::connect("bolt://localhost:7687", "neo4j", "secret").await?;
//! let rows = client.query("MATCH (f:SourceFile) RETURN count(f) AS count")
//!     .fetch_all()
//!     .await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use neo4rs::{BoltList, BoltMap, BoltNull, BoltString, BoltType, Graph, Txn};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::graph::row::{Params, Row, RowStream};
use crate::graph::traits::{CypherExecutor, GraphClient, Transaction};

/// Neo4j graph client.
///
/// Cheap to clone: `neo4rs::Graph` is a handle to a shared connection pool.
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Graph,
}

impl Neo4jClient {
    /// Connects to a Neo4j server.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, AppError> {
        let graph = Graph::new(uri, user, password).await?;
        Ok(Self { graph })
    }
}

#[async_trait]
impl CypherExecutor for Neo4jClient {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let mut stream = self
            .graph
            .execute(build_query(cypher, &params))
            .await
            .map_err(|e| query_error(e, cypher))?;

        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(|e| query_error(e, cypher))? {
            rows.push(convert_row(row)?);
        }
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        self.graph
            .run(build_query(cypher, &params))
            .await
            .map_err(|e| query_error(e, cypher))
    }
}

#[async_trait]
impl GraphClient for Neo4jClient {
    type Tx<'a> = Neo4jTransaction;

    async fn begin(&self) -> Result<Self::Tx<'_>, AppError> {
        let txn = self.graph.start_txn().await?;
        Ok(Neo4jTransaction {
            txn: Mutex::new(Some(txn)),
        })
    }
}

/// An explicit Neo4j transaction.
///
/// The driver needs `&mut Txn` per statement, so the handle sits behind an
/// async mutex. It is taken out on commit or rollback.
pub struct Neo4jTransaction {
    txn: Mutex<Option<Txn>>,
}

impl Neo4jTransaction {
    async fn take(&self) -> Result<Txn, AppError> {
        self.txn.lock().await.take().ok_or_else(finished)
    }
}

fn finished() -> AppError {
    AppError::Internal("transaction already finished".into())
}

#[async_trait]
impl CypherExecutor for Neo4jTransaction {
    async fn execute_cypher(
        &self,
        cypher: &str,
        params: Params,
    ) -> Result<RowStream<'_>, AppError> {
        let mut guard = self.txn.lock().await;
        let txn = guard.as_mut().ok_or_else(finished)?;

        let mut stream = txn
            .execute(build_query(cypher, &params))
            .await
            .map_err(|e| query_error(e, cypher))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .map_err(|e| query_error(e, cypher))?
        {
            rows.push(convert_row(row)?);
        }
        Ok(Box::pin(futures::stream::iter(rows.into_iter().map(Ok))))
    }

    async fn run_cypher(&self, cypher: &str, params: Params) -> Result<(), AppError> {
        let mut guard = self.txn.lock().await;
        let txn = guard.as_mut().ok_or_else(finished)?;
        txn.run(build_query(cypher, &params))
            .await
            .map_err(|e| query_error(e, cypher))
    }
}

#[async_trait]
impl Transaction for Neo4jTransaction {
    async fn commit(self) -> Result<(), AppError> {
        self.take().await?.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), AppError> {
        self.take().await?.rollback().await?;
        Ok(())
    }
}

impl Drop for Neo4jTransaction {
    fn drop(&mut self) {
        if self.txn.get_mut().is_some() {
            tracing::warn!("Neo4jTransaction dropped without commit or rollback; server will discard it");
        }
    }
}

/// Binds JSON parameters onto a driver query.
fn build_query(cypher: &str, params: &Params) -> neo4rs::Query {
    params
        .iter()
        .fold(neo4rs::query(cypher), |query, (name, value)| {
            query.param(name, to_bolt(value))
        })
}

/// Converts a JSON value into its Bolt equivalent.
///
/// Integral numbers become Bolt integers, all others floats.
fn to_bolt(value: &JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => BoltType::from(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => BoltType::from(i),
            None => BoltType::from(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => BoltType::from(s.as_str()),
        JsonValue::Array(items) => {
            BoltType::List(BoltList::from(items.iter().map(to_bolt).collect::<Vec<_>>()))
        }
        JsonValue::Object(map) => BoltType::Map(
            map.iter()
                .map(|(k, v)| (BoltString::from(k.as_str()), to_bolt(v)))
                .collect::<BoltMap>(),
        ),
    }
}

fn convert_row(row: neo4rs::Row) -> Result<Row, AppError> {
    row.to::<HashMap<String, JsonValue>>()
        .map(Row::new)
        .map_err(|e| AppError::Internal(format!("Failed to decode row: {}", e)))
}

fn query_error(err: neo4rs::Error, cypher: &str) -> AppError {
    AppError::Query {
        message: format!("Cypher query failed: {}", err),
        query: cypher.to_string(),
    }
}
