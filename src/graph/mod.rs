//! Graph abstraction layer for backend-agnostic database access.
//!
//! The ingestion pipeline only needs a handful of primitives from the
//! store: auto-commit statements, explicit transactions and row reads.
//! Those are captured by the traits in [`traits`], with concrete
//! implementations under [`backends`]:
//!
//! - [`CypherExecutor`] - Execute Cypher queries
//! - [`Transaction`] - Transaction lifecycle (commit/rollback)
//! - [`GraphClient`] - Connection management and transaction creation
//!
//! # Usage
//!
//! ```ignore
//! use treeline::graph::{GraphClient, QueryExt, Transaction};
//!
//! let txn = client.begin().await?;
//! txn.query("MERGE (f:SourceFile {path: $path})")
//!     .param("path", "src/app.py")
//!     .run()
//!     .await?;
//! txn.commit().await?;
//! ```

mod query;
mod row;
mod traits;

pub mod backends;

pub use query::{Query, QueryExt};
pub use row::{Params, Row, RowStream};
pub use traits::{CypherExecutor, GraphClient, Transaction};
