//! Canonical embedding text for an entity.

use crate::models::Entity;

/// Snippet cap in UTF-8 bytes.
pub const MAX_SNIPPET_BYTES: usize = 32 * 1024;

/// Renders `entity` as the text fed to the embedder.
///
/// ```text
/// Function greet [python] src/app.py:1-3
/// doc: Say hello.
/// def greet(name):
///     ...
/// ```
///
/// The doc line is omitted when the entity has no doc.
pub fn compose(entity: &Entity, path: &str) -> String {
    let mut lines = vec![format!(
        "{} {} [{}] {}:{}-{}",
        entity.kind, entity.name, entity.language, path, entity.start_line, entity.end_line
    )];
    if !entity.doc.is_empty() {
        lines.push(format!("doc: {}", entity.doc));
    }
    lines.push(truncate(&entity.snippet, MAX_SNIPPET_BYTES).to_string());
    lines.join("\n")
}

/// Longest prefix of `text` within `max` bytes that ends on a char boundary.
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
