//! Entity extraction from syntax trees.
//!
//! A pre-order walk tests every node against the language's rule table.
//! Matches emit an [`Entity`] and the walk keeps descending, so nested
//! functions and classes come out as additional flat records.

use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::error::AppError;
use crate::languages::{classify, Language, LanguageSpec};
use crate::models::{Entity, EntityKind, ANON_NAME};

/// Node types that carry a bare identifier across the supported grammars.
const IDENTIFIER_KINDS: &[&str] = &[
    "identifier",
    "type_identifier",
    "property_identifier",
    "private_property_identifier",
    "field_identifier",
];

/// Decodes, parses and extracts one file's bytes.
///
/// Bytes that are not UTF-8 count as a parse failure.
pub fn extract_source(
    path: &Path,
    spec: LanguageSpec,
    bytes: Vec<u8>,
) -> Result<Vec<Entity>, AppError> {
    let source = String::from_utf8(bytes).map_err(|e| AppError::Parse {
        path: path.to_path_buf(),
        reason: format!("not valid UTF-8: {}", e),
    })?;
    let tree = spec.grammar.parse(path, &source)?;
    Ok(extract(&tree, &source, spec.language))
}

/// Walks `tree` and returns its entities in traversal order.
pub fn extract(tree: &Tree, source: &str, language: Language) -> Vec<Entity> {
    let rules = language.entity_rules();
    let mut entities = Vec::new();
    let mut cursor = tree.walk();

    loop {
        let node = cursor.node();
        if let Some(kind) = classify(rules, &node) {
            entities.push(build_entity(&node, kind, source, language));
        }

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return entities;
            }
        }
    }
}

fn build_entity(node: &Node<'_>, kind: EntityKind, source: &str, language: Language) -> Entity {
    let start_line = node.start_position().row + 1;
    let end_line = (node.end_position().row + 1).max(start_line);
    let doc = if language.has_docstrings() {
        docstring(node, source).unwrap_or_default()
    } else {
        String::new()
    };

    Entity {
        kind,
        name: resolve_name(node, source),
        language,
        start_line,
        end_line,
        snippet: source.get(node.byte_range()).unwrap_or_default().to_string(),
        doc,
    }
}

/// Best-effort name for `node`; never empty.
///
/// Tries the `name` field, then a leading identifier child, then the first
/// identifier anywhere below the node, then [`ANON_NAME`].
pub fn resolve_name(node: &Node<'_>, source: &str) -> String {
    node.child_by_field_name("name")
        .and_then(|name| node_text(&name, source))
        .or_else(|| positional_name(node, source))
        .or_else(|| descendant_name(node, source))
        .unwrap_or_else(|| ANON_NAME.to_string())
}

fn node_text(node: &Node<'_>, source: &str) -> Option<String> {
    let text = source.get(node.byte_range())?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn is_identifier(node: &Node<'_>) -> bool {
    IDENTIFIER_KINDS.contains(&node.kind())
}

fn positional_name(node: &Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let first = node.named_children(&mut cursor).next()?;
    if is_identifier(&first) {
        node_text(&first, source)
    } else {
        None
    }
}

fn descendant_name(node: &Node<'_>, source: &str) -> Option<String> {
    let mut cursor = node.walk();
    let mut stack: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
    stack.reverse();

    while let Some(current) = stack.pop() {
        if is_identifier(&current) {
            if let Some(text) = node_text(&current, source) {
                return Some(text);
            }
        }
        let mut child_cursor = current.walk();
        let children: Vec<Node<'_>> = current.named_children(&mut child_cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}

/// Statement-first docstring: the body's first statement, when it is a
/// bare string literal.
fn docstring(node: &Node<'_>, source: &str) -> Option<String> {
    let body = node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    let first = body
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }

    let mut stmt_cursor = first.walk();
    let mut exprs = first.named_children(&mut stmt_cursor);
    let expr = exprs.next()?;
    if expr.kind() != "string" || exprs.next().is_some() {
        return None;
    }
    unquote(source.get(expr.byte_range())?)
}

/// Strips prefix letters and quotes from a Python string literal.
fn unquote(raw: &str) -> Option<String> {
    let prefix_len = raw
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(raw.len());
    let (prefix, literal) = raw.split_at(prefix_len);
    // f-strings and bytes literals never become __doc__
    if prefix.contains(['f', 'F', 'b', 'B']) {
        return None;
    }

    ["\"\"\"", "'''", "\"", "'"].iter().find_map(|quote| {
        let inner = literal.strip_prefix(quote)?.strip_suffix(quote)?;
        Some(inner.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{lookup, Grammar};

    fn extract_str(ext: &str, source: &str) -> Vec<Entity> {
        let spec = lookup(ext).unwrap();
        let path = format!("test.{}", ext);
        extract_source(Path::new(&path), spec, source.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_python_function_and_class() {
        let source = "def greet(name):\n    return name\n\n\nclass Greeter:\n    pass\n";
        let entities = extract_str("py", source);

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].kind, EntityKind::Function);
        assert_eq!(entities[0].name, "greet");
        assert_eq!((entities[0].start_line, entities[0].end_line), (1, 2));
        assert_eq!(entities[0].snippet, "def greet(name):\n    return name");

        assert_eq!(entities[1].kind, EntityKind::Class);
        assert_eq!(entities[1].name, "Greeter");
        assert_eq!((entities[1].start_line, entities[1].end_line), (5, 6));
    }

    #[test]
    fn test_python_docstrings() {
        let source = r#"
def documented():
    """Say hello.
    """
    return 1

def plain():
    x = "not a doc"
    return x

class Widget:
    # leading comment
    'Widget docs'
"#;
        let entities = extract_str("py", source);
        assert_eq!(entities[0].doc, "Say hello.");
        assert_eq!(entities[1].doc, "");
        assert_eq!(entities[2].doc, "Widget docs");
    }

    #[test]
    fn test_bytes_literal_is_not_a_docstring() {
        let entities = extract_str("py", "def f():\n    b\"bytes\"\n");
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].doc, "");
    }

    #[test]
    fn test_nested_definitions_are_flat() {
        let source = "class Outer:\n    def method(self):\n        def inner():\n            pass\n";
        let names: Vec<String> = extract_str("py", source)
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["Outer", "method", "inner"]);
    }

    #[test]
    fn test_go_struct_only() {
        let source = r#"package shapes

type Point struct {
	X int
}

type Shape interface {
	Area() float64
}

type Meters = float64

func (p Point) Norm() int { return p.X }
"#;
        let entities = extract_str("go", source);
        let summary: Vec<(EntityKind, &str)> = entities
            .iter()
            .map(|e| (e.kind, e.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(EntityKind::Class, "Point"), (EntityKind::Function, "Norm")]
        );
    }

    #[test]
    fn test_rust_items() {
        let source = "struct Config;\n\nenum Mode { A }\n\ntype Alias = u8;\n\nfn run() {}\n";
        let kinds: Vec<(EntityKind, String)> = extract_str("rs", source)
            .into_iter()
            .map(|e| (e.kind, e.name))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (EntityKind::Class, "Config".to_string()),
                (EntityKind::Class, "Mode".to_string()),
                (EntityKind::Function, "run".to_string()),
            ]
        );
    }

    #[test]
    fn test_typescript_class_and_methods() {
        let source = "export class Store {\n  get(key: string): number {\n    return 1;\n  }\n}\n\nfunction helper(): void {}\n";
        let entities = extract_str("ts", source);
        let names: Vec<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Store", "get", "helper"]);
        assert!(entities.iter().all(|e| e.language == Language::TypeScript));
        assert!(entities.iter().all(|e| e.doc.is_empty()));
    }

    #[test]
    fn test_java_constructor_and_record() {
        let source = "class Account {\n  Account() {}\n  void deposit(int amount) {}\n}\nrecord Pair(int a, int b) {}\n";
        let entities = extract_str("java", source);
        let summary: Vec<(EntityKind, &str)> = entities
            .iter()
            .map(|e| (e.kind, e.name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EntityKind::Class, "Account"),
                (EntityKind::Function, "Account"),
                (EntityKind::Function, "deposit"),
                (EntityKind::Class, "Pair"),
            ]
        );
    }

    #[test]
    fn test_no_entities_yields_empty() {
        assert!(extract_str("py", "x = 1\nprint(x)\n").is_empty());
    }

    #[test]
    fn test_spans_are_one_indexed_and_ordered() {
        let source = "\n\nfunction a() {\n}\nclass B { m() {} }\n";
        for entity in extract_str("js", source) {
            assert!(entity.start_line >= 1);
            assert!(entity.start_line <= entity.end_line);
        }
    }

    #[test]
    fn test_name_falls_back_to_descendant_identifier() {
        let source = "compute(1)\n";
        let tree = Grammar::Python.parse(Path::new("x.py"), source).unwrap();
        let stmt = tree.root_node().named_child(0).unwrap();
        assert_eq!(stmt.kind(), "expression_statement");
        assert_eq!(resolve_name(&stmt, source), "compute");
    }

    #[test]
    fn test_name_falls_back_to_sentinel() {
        let source = "42\n";
        let tree = Grammar::Python.parse(Path::new("x.py"), source).unwrap();
        let stmt = tree.root_node().named_child(0).unwrap();
        assert_eq!(resolve_name(&stmt, source), ANON_NAME);
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let spec = lookup("py").unwrap();
        let result = extract_source(Path::new("bin.py"), spec, vec![0xff, 0xfe, 0x00]);
        assert!(matches!(result, Err(AppError::Parse { .. })));
    }

    #[test]
    fn test_unquote_variants() {
        assert_eq!(unquote(r#""""triple""""#).as_deref(), Some("triple"));
        assert_eq!(unquote("r'raw'").as_deref(), Some("raw"));
        assert_eq!(unquote("f'{x}'"), None);
        assert_eq!(unquote("b'bytes'"), None);
        assert_eq!(unquote(r#"Rb"raw bytes""#), None);
        assert_eq!(unquote("plain"), None);
    }
}
