//! Data access layer for the code graph.
//!
//! Repositories own the Cypher text and hide the store behind a
//! [`GraphClient`](crate::graph::GraphClient).

mod code_graph;
pub mod statements;

pub use code_graph::{CodeGraphRepository, GraphStats};
