//! Parsing infrastructure

pub mod language_registry;
pub mod source_registry;
pub mod tree_sitter_parser;

pub use source_registry::SourceRegistry;
pub use tree_sitter_parser::TreeSitterParser;
