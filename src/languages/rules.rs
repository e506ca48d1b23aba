//! Per-language tables of entity-producing node types.
//!
//! A node type missing from a language's table never produces an entity,
//! even when another grammar has a node of the same shape.

use tree_sitter::Node;

use crate::languages::Language;
use crate::models::EntityKind;

/// Maps one grammar node type to an entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRule {
    pub node: &'static str,
    pub kind: EntityKind,
    /// Extra structural requirement on a child field.
    pub when: Option<FieldIs>,
}

/// Requires the node's `field` child to be of node type `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIs {
    pub field: &'static str,
    pub kind: &'static str,
}

const fn rule(node: &'static str, kind: EntityKind) -> EntityRule {
    EntityRule {
        node,
        kind,
        when: None,
    }
}

const PYTHON: &[EntityRule] = &[
    rule("function_definition", EntityKind::Function),
    rule("class_definition", EntityKind::Class),
];

const JAVASCRIPT: &[EntityRule] = &[
    rule("function_declaration", EntityKind::Function),
    rule("generator_function_declaration", EntityKind::Function),
    rule("method_definition", EntityKind::Function),
    rule("class_declaration", EntityKind::Class),
];

const TYPESCRIPT: &[EntityRule] = &[
    rule("function_declaration", EntityKind::Function),
    rule("generator_function_declaration", EntityKind::Function),
    rule("method_definition", EntityKind::Function),
    rule("class_declaration", EntityKind::Class),
    rule("abstract_class_declaration", EntityKind::Class),
];

// Only struct types count; interfaces and aliases are type declarations
// without a class form.
const GO: &[EntityRule] = &[
    rule("function_declaration", EntityKind::Function),
    rule("method_declaration", EntityKind::Function),
    EntityRule {
        node: "type_spec",
        kind: EntityKind::Class,
        when: Some(FieldIs {
            field: "type",
            kind: "struct_type",
        }),
    },
];

const RUST: &[EntityRule] = &[
    rule("function_item", EntityKind::Function),
    rule("struct_item", EntityKind::Class),
    rule("enum_item", EntityKind::Class),
    rule("union_item", EntityKind::Class),
    rule("trait_item", EntityKind::Class),
];

const JAVA: &[EntityRule] = &[
    rule("method_declaration", EntityKind::Function),
    rule("constructor_declaration", EntityKind::Function),
    rule("class_declaration", EntityKind::Class),
    rule("enum_declaration", EntityKind::Class),
    rule("record_declaration", EntityKind::Class),
];

pub(super) fn for_language(language: Language) -> &'static [EntityRule] {
    match language {
        Language::Python => PYTHON,
        Language::JavaScript => JAVASCRIPT,
        Language::TypeScript => TYPESCRIPT,
        Language::Go => GO,
        Language::Rust => RUST,
        Language::Java => JAVA,
    }
}

impl EntityRule {
    fn matches(&self, node: &Node<'_>) -> bool {
        if node.kind() != self.node {
            return false;
        }
        match self.when {
            None => true,
            Some(FieldIs { field, kind }) => node
                .child_by_field_name(field)
                .is_some_and(|child| child.kind() == kind),
        }
    }
}

/// Returns the entity kind `node` produces under `rules`, if any.
pub fn classify(rules: &[EntityRule], node: &Node<'_>) -> Option<EntityKind> {
    rules
        .iter()
        .find(|rule| rule.matches(node))
        .map(|rule| rule.kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::grammars_for;

    const ALL: &[Language] = &[
        Language::Python,
        Language::JavaScript,
        Language::TypeScript,
        Language::Go,
        Language::Rust,
        Language::Java,
    ];

    #[test]
    fn test_every_rule_names_a_real_node_type() {
        for &language in ALL {
            for grammar in grammars_for(language) {
                let ts = grammar.ts_language();
                for rule in language.entity_rules() {
                    assert_ne!(
                        ts.id_for_node_kind(rule.node, true),
                        0,
                        "{} is not a node type in {:?}",
                        rule.node,
                        grammar
                    );
                    if let Some(FieldIs { field, kind }) = rule.when {
                        assert!(ts.field_id_for_name(field).is_some(), "no field {}", field);
                        assert_ne!(ts.id_for_node_kind(kind, true), 0, "no node {}", kind);
                    }
                }
            }
        }
    }

    #[test]
    fn test_every_language_has_both_kinds() {
        for &language in ALL {
            let rules = language.entity_rules();
            assert!(rules.iter().any(|r| r.kind == EntityKind::Function));
            assert!(rules.iter().any(|r| r.kind == EntityKind::Class));
        }
    }

    #[test]
    fn test_node_types_unique_per_table() {
        for &language in ALL {
            let rules = language.entity_rules();
            for (i, a) in rules.iter().enumerate() {
                assert!(
                    rules[i + 1..].iter().all(|b| b.node != a.node),
                    "duplicate {} in {}",
                    a.node,
                    language
                );
            }
        }
    }
}
