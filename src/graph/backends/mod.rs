//! Backend implementations for different graph stores.
//!
//! Each backend implements the core traits from [`crate::graph`]:
//! [`CypherExecutor`](crate::graph::CypherExecutor),
//! [`Transaction`](crate::graph::Transaction) and
//! [`GraphClient`](crate::graph::GraphClient).
//!
//! | Backend | Module | Persistence |
//! |---------|--------|-------------|
//! | Neo4j (Bolt) | [`neo4j`] | Durable |
//! | In-process | [`memory`] | None (dry runs, tests) |

pub mod memory;
pub mod neo4j;
