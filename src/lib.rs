//! Treeline - polyglot code entity extraction into a graph store.
//!
//! Source files are parsed with tree-sitter, their functions and classes
//! embedded, and the results upserted as `SourceFile` and `Entity` nodes
//! joined by `CONTAINS` edges.

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod languages;
pub mod models;
pub mod repositories;
pub mod services;
