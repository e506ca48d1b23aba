//! Entity model: a function or class-like declaration extracted from source.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::languages::Language;

/// Name recorded when no strategy resolves an identifier.
pub const ANON_NAME: &str = "<anon>";

/// What an extracted declaration is.
///
/// Structs, enums, traits and the like map to `Class` in languages without
/// a class concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Function,
    Class,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "Function",
            EntityKind::Class => "Class",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Function" => Ok(EntityKind::Function),
            "Class" => Ok(EntityKind::Class),
            _ => Err(format!("Invalid entity kind: {}", s)),
        }
    }
}

/// A declaration extracted from one file.
///
/// Lines are 1-indexed and inclusive. `snippet` is the exact node text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub kind: EntityKind,
    pub name: String,
    pub language: Language,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    /// Leading docstring; empty when the language has none or it is absent.
    pub doc: String,
}

impl Entity {
    /// Composite identity: `path:start:end:kind`.
    ///
    /// Stable across re-parses of unchanged code. Any change to the span
    /// yields a new uid, and the old node stays in the graph.
    pub fn uid(&self, path: &str) -> String {
        format!("{}:{}:{}:{}", path, self.start_line, self.end_line, self.kind)
    }

    /// Every mutable node property, written wholesale on upsert.
    pub fn properties(&self, path: &str, embedding: &[f32]) -> JsonValue {
        json!({
            "path": path,
            "kind": self.kind.as_str(),
            "name": self.name,
            "language": self.language.id(),
            "startLine": self.start_line,
            "endLine": self.end_line,
            "snippet": self.snippet,
            "doc": self.doc,
            "embedding": embedding,
        })
    }
}

/// An Entity node as stored in the graph.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub uid: String,
    pub path: String,
    pub kind: EntityKind,
    pub name: String,
    pub language: String,
    pub start_line: usize,
    pub end_line: usize,
    pub snippet: String,
    pub doc: String,
    pub embedding: Vec<f32>,
    pub created: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entity {
        Entity {
            kind: EntityKind::Function,
            name: "greet".into(),
            language: Language::Python,
            start_line: 3,
            end_line: 9,
            snippet: "def greet(): pass".into(),
            doc: String::new(),
        }
    }

    #[test]
    fn test_uid_composition() {
        assert_eq!(sample().uid("src/app.py"), "src/app.py:3:9:Function");
    }

    #[test]
    fn test_uid_changes_with_end_line() {
        let before = sample();
        let after = Entity {
            end_line: 12,
            ..sample()
        };
        assert_ne!(before.uid("a.py"), after.uid("a.py"));
    }

    #[test]
    fn test_properties_cover_mutable_fields() {
        let props = sample().properties("src/app.py", &[0.5, -0.5]);
        for key in [
            "path", "kind", "name", "language", "startLine", "endLine", "snippet", "doc",
            "embedding",
        ] {
            assert!(props.get(key).is_some(), "missing {}", key);
        }
        assert!(props.get("uid").is_none());
        assert!(props.get("created").is_none());
    }

    #[test]
    fn test_kind_round_trips_through_str() {
        assert_eq!("Class".parse::<EntityKind>(), Ok(EntityKind::Class));
        assert!("Struct".parse::<EntityKind>().is_err());
    }
}
