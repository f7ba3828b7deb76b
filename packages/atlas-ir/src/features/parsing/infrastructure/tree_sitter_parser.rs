//! Tree-sitter parser implementation

use crate::features::parsing::domain::ParsedTree;
use crate::features::parsing::infrastructure::language_registry::{grammar, strip_bom};
use crate::features::parsing::ports::SourceParser;
use crate::shared::models::{AtlasError, LanguageId, Result, SourceFile};
use tree_sitter::Parser;

/// Parser over the registered tree-sitter grammars.
///
/// A fresh tree_sitter::Parser is created per call; they are cheap and
/// the grammar objects are process-wide statics inside the grammar
/// crates, which keeps parsing deterministic and thread-safe.
pub struct TreeSitterParser;

impl TreeSitterParser {
    pub fn new() -> Self {
        Self
    }

    /// Preorder walk hashing node kinds plus leaf token text, comments
    /// skipped.
    ///
    /// Formatting and comment edits leave the hash unchanged (the walk
    /// never sees whitespace and drops comment nodes); any token-level
    /// change — operators, literals, identifiers — changes it. This is
    /// what the NO_IMPACT classification keys on.
    fn ast_hash(root: tree_sitter::Node<'_>, source: &[u8]) -> String {
        let mut hasher = blake3::Hasher::new();
        let mut cursor = root.walk();
        let mut done = false;

        while !done {
            let node = cursor.node();
            let is_comment = node.kind().contains("comment");
            if !is_comment {
                hasher.update(node.kind().as_bytes());
                hasher.update(&[0]);
                if node.child_count() == 0 {
                    if let Ok(text) = node.utf8_text(source) {
                        hasher.update(text.as_bytes());
                        hasher.update(&[1]);
                    }
                }
            }

            if !is_comment && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    done = true;
                    break;
                }
            }
        }

        let hex = hasher.finalize().to_hex();
        hex.as_str()[..16].to_string()
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceParser for TreeSitterParser {
    fn parse(&self, file: &SourceFile) -> Result<ParsedTree> {
        let source = strip_bom(&file.content);

        let mut parser = Parser::new();
        let language = grammar(file.language);
        parser
            .set_language(&language)
            .map_err(|e| AtlasError::parse(format!("grammar init failed: {}", e)).with_file(&file.path))?;

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| AtlasError::parse("parser returned no tree").with_file(&file.path))?;

        let root = tree.root_node();
        let has_errors = root.has_error();
        if has_errors {
            tracing::warn!("parse errors in {}, keeping partial tree", file.path);
        }
        let ast_hash = Self::ast_hash(root, source.as_bytes());

        Ok(ParsedTree {
            tree,
            language: file.language,
            file_path: file.path.clone(),
            has_errors,
            ast_hash,
        })
    }

    fn supports(&self, _language: LanguageId) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> ParsedTree {
        let file = SourceFile::new("test.py", LanguageId::Python, content);
        TreeSitterParser::new().parse(&file).unwrap()
    }

    #[test]
    fn test_parse_python_ok() {
        let tree = parse("def foo():\n    return 1\n");
        assert!(!tree.has_errors);
        assert_eq!(tree.root().kind(), "module");
    }

    #[test]
    fn test_parse_deterministic() {
        let a = parse("def foo():\n    return 1\n");
        let b = parse("def foo():\n    return 1\n");
        assert_eq!(a.ast_hash, b.ast_hash);
    }

    #[test]
    fn test_ast_hash_ignores_comments() {
        let a = parse("def foo():\n    return 1\n");
        let b = parse("# a comment\ndef foo():\n    return 1\n");
        assert_eq!(a.ast_hash, b.ast_hash);

        let c = parse("def foo():\n    return 2 + 1\n");
        assert_ne!(a.ast_hash, c.ast_hash);
    }

    #[test]
    fn test_parse_error_keeps_partial_tree() {
        let tree = parse("def foo(:\n    return 1\n");
        assert!(tree.has_errors);
        // Partial tree is still walkable
        assert!(tree.root().child_count() > 0);
    }

    #[test]
    fn test_parse_typescript() {
        let file = SourceFile::new(
            "app.ts",
            LanguageId::TypeScript,
            "function greet(name: string): string { return name; }",
        );
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        assert!(!tree.has_errors);
    }
}
