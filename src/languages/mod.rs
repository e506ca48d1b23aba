//! Language registry: file extension → language id + grammar.
//!
//! Grammars are statically linked tree-sitter crates. Parsing is stateless:
//! every [`Grammar::parse`] call builds its own `tree_sitter::Parser`, so
//! concurrent parse tasks never share parser state.

mod rules;

use std::path::Path;

use crate::error::AppError;

pub use rules::{classify, EntityRule, FieldIs};

/// Source language id recorded on every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Go,
    Rust,
    Java,
}

impl Language {
    /// Stable identifier stored in the graph.
    pub fn id(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Java => "java",
        }
    }

    /// Whether a leading string statement in a body is a docstring.
    pub fn has_docstrings(&self) -> bool {
        matches!(self, Language::Python)
    }

    /// Grammar-specific node types that produce entities.
    pub fn entity_rules(&self) -> &'static [EntityRule] {
        rules::for_language(*self)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// A parse capability. Several extensions may share one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Grammar {
    Python,
    JavaScript,
    TypeScript,
    Tsx,
    Go,
    Rust,
    Java,
}

impl Grammar {
    /// The native tree-sitter language for this grammar.
    pub fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::Go => tree_sitter_go::LANGUAGE.into(),
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Parses `source` into a syntax tree.
    ///
    /// Trees containing syntax errors are rejected: the grammar did not
    /// accept the input.
    pub fn parse(&self, path: &Path, source: &str) -> Result<tree_sitter::Tree, AppError> {
        let parse_error = |reason: String| AppError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&self.ts_language())
            .map_err(|e| parse_error(format!("grammar version mismatch: {}", e)))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| parse_error("parser returned no tree".into()))?;

        if tree.root_node().has_error() {
            return Err(parse_error("source contains syntax errors".into()));
        }
        Ok(tree)
    }
}

/// Registry entry for a supported extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageSpec {
    pub language: Language,
    pub grammar: Grammar,
}

/// Extension (without dot) → language and grammar.
const EXTENSIONS: &[(&str, Language, Grammar)] = &[
    ("py", Language::Python, Grammar::Python),
    ("pyi", Language::Python, Grammar::Python),
    ("js", Language::JavaScript, Grammar::JavaScript),
    ("jsx", Language::JavaScript, Grammar::JavaScript),
    ("mjs", Language::JavaScript, Grammar::JavaScript),
    ("cjs", Language::JavaScript, Grammar::JavaScript),
    ("ts", Language::TypeScript, Grammar::TypeScript),
    ("mts", Language::TypeScript, Grammar::TypeScript),
    ("cts", Language::TypeScript, Grammar::TypeScript),
    ("tsx", Language::TypeScript, Grammar::Tsx),
    ("go", Language::Go, Grammar::Go),
    ("rs", Language::Rust, Grammar::Rust),
    ("java", Language::Java, Grammar::Java),
];

/// Looks up an extension, case-insensitively and with or without the dot.
///
/// `None` means unsupported: the file is skipped, not an error.
pub fn lookup(extension: &str) -> Option<LanguageSpec> {
    let extension = extension.trim_start_matches('.');
    EXTENSIONS
        .iter()
        .find(|(ext, _, _)| ext.eq_ignore_ascii_case(extension))
        .map(|&(_, language, grammar)| LanguageSpec { language, grammar })
}

/// Looks up a path by its extension.
pub fn for_path(path: &Path) -> Option<LanguageSpec> {
    path.extension().and_then(|e| e.to_str()).and_then(lookup)
}

/// Every grammar a language is parsed with.
#[cfg(test)]
pub(crate) fn grammars_for(language: Language) -> impl Iterator<Item = Grammar> {
    let mut grammars: Vec<Grammar> = EXTENSIONS
        .iter()
        .filter(|(_, lang, _)| *lang == language)
        .map(|(_, _, grammar)| *grammar)
        .collect();
    grammars.dedup();
    grammars.into_iter()
}
