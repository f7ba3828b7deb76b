//! FQN construction
//!
//! `package.Class.method` for named symbols, positional names
//! (`__closure_L42_C5`) for anonymous scopes.

use crate::shared::models::Span;

/// Module path from a repository-relative file path:
/// `pkg/mod.py` → `pkg.mod`, `pkg/__init__.py` → `pkg`.
pub fn module_path(file_path: &str) -> String {
    let without_ext = file_path
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_path);

    let mut parts: Vec<&str> = without_ext.split('/').filter(|p| !p.is_empty()).collect();

    if parts.last() == Some(&"__init__") || parts.last() == Some(&"index") {
        parts.pop();
    }

    parts.join(".")
}

/// Positional name for an anonymous scope
pub fn anonymous_name(span: Span) -> String {
    format!("__closure_L{}_C{}", span.start_line + 1, span.start_col)
}

/// Scope-stack FQN builder
#[derive(Debug, Clone)]
pub struct FqnBuilder {
    stack: Vec<String>,
}

impl FqnBuilder {
    pub fn for_module(file_path: &str) -> Self {
        let module = module_path(file_path);
        let stack = if module.is_empty() {
            Vec::new()
        } else {
            vec![module]
        };
        Self { stack }
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.stack.push(segment.into());
    }

    pub fn pop(&mut self) {
        self.stack.pop();
    }

    /// FQN for a child of the current scope
    pub fn child(&self, name: &str) -> String {
        if self.stack.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", self.stack.join("."), name)
        }
    }

    /// FQN of the current scope itself
    pub fn current(&self) -> String {
        self.stack.join(".")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_path() {
        assert_eq!(module_path("pkg/mod.py"), "pkg.mod");
        assert_eq!(module_path("mod.py"), "mod");
        assert_eq!(module_path("pkg/__init__.py"), "pkg");
        assert_eq!(module_path("src/app/index.ts"), "src.app");
    }

    #[test]
    fn test_fqn_builder() {
        let mut builder = FqnBuilder::for_module("pkg/mod.py");
        assert_eq!(builder.child("f"), "pkg.mod.f");

        builder.push("Cls");
        assert_eq!(builder.child("method"), "pkg.mod.Cls.method");
        assert_eq!(builder.current(), "pkg.mod.Cls");

        builder.pop();
        assert_eq!(builder.child("g"), "pkg.mod.g");
    }

    #[test]
    fn test_anonymous_name_is_positional() {
        assert_eq!(anonymous_name(Span::new(41, 5, 41, 20)), "__closure_L42_C5");
    }
}
