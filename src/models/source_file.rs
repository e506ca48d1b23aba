//! Per-file extraction results.

use crate::languages::Language;
use crate::models::Entity;

/// A source file that parsed cleanly, with its entities in traversal order.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Repository-relative path with `/` separators; the SourceFile key.
    pub path: String,
    pub language: Language,
    pub entities: Vec<Entity>,
}
