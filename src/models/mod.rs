//! Domain models for the code graph.

mod entity;
mod source_file;

pub use entity::{Entity, EntityKind, EntityRecord, ANON_NAME};
pub use source_file::ParsedFile;
