//! Parsed TypeScript / JavaScript source files.
//!
//! A [`SourceTree`] pairs the file text with its tree-sitter syntax tree.
//! Edits rewrite the text and reparse, so the tree always describes the
//! current text and printing is lossless.

use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    TypeScript,
    JavaScript,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::TypeScript => "ts",
            SourceKind::JavaScript => "js",
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self {
            SourceKind::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceKind::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to set language: {0}")]
    Language(String),

    #[error("parser produced no tree")]
    NoTree,

    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },
}

#[derive(Debug, Clone)]
pub struct SourceTree {
    kind: SourceKind,
    text: String,
    tree: Tree,
}

impl SourceTree {
    pub fn parse(kind: SourceKind, text: impl Into<String>) -> Result<Self, SourceError> {
        let text = text.into();
        let mut parser = Parser::new();
        parser
            .set_language(&kind.language())
            .map_err(|e| SourceError::Language(e.to_string()))?;
        let tree = parser.parse(&text, None).ok_or(SourceError::NoTree)?;

        let root = tree.root_node();
        if root.has_error() {
            let at = first_error(root).unwrap_or(root).start_position();
            return Err(SourceError::Syntax {
                line: at.row + 1,
                column: at.column + 1,
            });
        }
        Ok(Self { kind, text, tree })
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    /// The printed source.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Text of each top-level statement, in order.
    pub fn top_level_statements(&self) -> Vec<&str> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .map(|n| &self.text[n.byte_range()])
            .collect()
    }

    /// True when a top-level `import ... from "<module>"` exists.
    pub fn contains_import(&self, module: &str) -> bool {
        self.imports().any(|n| self.import_source(n) == Some(module))
    }

    /// Append `statement` after the last top-level statement.
    pub fn append_statement(&mut self, statement: &str) -> Result<(), SourceError> {
        let mut text = self.text.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(statement.trim_end());
        text.push('\n');
        *self = Self::parse(self.kind, text)?;
        Ok(())
    }

    /// Insert `statement` after the last import unless `module` is already imported.
    ///
    /// Returns whether the text changed.
    pub fn ensure_import(&mut self, module: &str, statement: &str) -> Result<bool, SourceError> {
        if self.contains_import(module) {
            return Ok(false);
        }
        let insert_at = self.imports().map(|n| n.end_byte()).max();
        let text = match insert_at {
            Some(end) => format!(
                "{}\n{}{}",
                &self.text[..end],
                statement.trim_end(),
                &self.text[end..]
            ),
            None => format!("{}\n{}", statement.trim_end(), self.text),
        };
        *self = Self::parse(self.kind, text)?;
        Ok(true)
    }

    fn imports(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let statements: Vec<Node<'_>> = root.named_children(&mut cursor).collect();
        statements
            .into_iter()
            .filter(|n| n.kind() == "import_statement")
    }

    fn import_source(&self, import: Node<'_>) -> Option<&str> {
        let source = import.child_by_field_name("source")?;
        let raw = &self.text[source.byte_range()];
        Some(raw.trim_matches(|c| c == '"' || c == '\'' || c == '`'))
    }
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_print_roundtrip() {
        let src = "import { a } from './a';\n\nexport const b: number = a + 1;\n";
        let tree = SourceTree::parse(SourceKind::TypeScript, src).unwrap();
        assert_eq!(tree.text(), src);
        assert_eq!(tree.top_level_statements().len(), 2);
    }

    #[test]
    fn empty_source_is_valid() {
        let tree = SourceTree::parse(SourceKind::JavaScript, "").unwrap();
        assert!(tree.is_empty());
        assert!(tree.top_level_statements().is_empty());
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = SourceTree::parse(SourceKind::TypeScript, "const = ;\n").unwrap_err();
        assert!(matches!(err, SourceError::Syntax { line: 1, .. }));
    }

    #[test]
    fn append_statement_adds_trailing_line() {
        let mut tree = SourceTree::parse(SourceKind::JavaScript, "const a = 1;").unwrap();
        tree.append_statement("export default a;").unwrap();
        assert_eq!(tree.text(), "const a = 1;\nexport default a;\n");
    }

    #[test]
    fn append_rejects_invalid_statement() {
        let mut tree = SourceTree::parse(SourceKind::JavaScript, "const a = 1;\n").unwrap();
        assert!(tree.append_statement("export default (;").is_err());
        assert_eq!(tree.text(), "const a = 1;\n");
    }

    #[test]
    fn ensure_import_inserts_after_last_import() {
        let src = "import a from 'a';\nimport b from \"b\";\n\nconsole.log(a, b);\n";
        let mut tree = SourceTree::parse(SourceKind::TypeScript, src).unwrap();
        assert!(tree.contains_import("a"));
        assert!(tree.contains_import("b"));

        let changed = tree.ensure_import("c", "import c from 'c';").unwrap();
        assert!(changed);
        assert_eq!(
            tree.text(),
            "import a from 'a';\nimport b from \"b\";\nimport c from 'c';\n\nconsole.log(a, b);\n"
        );
        assert!(!tree.ensure_import("c", "import c from 'c';").unwrap());
    }

    #[test]
    fn ensure_import_without_imports_prepends() {
        let mut tree = SourceTree::parse(SourceKind::TypeScript, "run();\n").unwrap();
        tree.ensure_import("x", "import x from 'x';").unwrap();
        assert_eq!(tree.text(), "import x from 'x';\nrun();\n");
    }
}
