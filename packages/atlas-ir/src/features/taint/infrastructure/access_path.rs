//! Field-sensitive access paths

use serde::{Deserialize, Serialize};
use std::fmt;

/// (base variable, field chain), truncated at a configured depth.
/// Beyond the depth the path widens to its prefix, which keeps the
/// abstract domain finite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessPath {
    pub base: String,
    pub fields: Vec<String>,
}

impl AccessPath {
    pub fn var(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(base: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            fields: vec![field.into()],
        }
    }

    /// Parse a dotted path (`a.b.c` → base a, fields [b, c])
    pub fn parse(path: &str) -> Self {
        let mut parts = path.split('.');
        let base = parts.next().unwrap_or(path).to_string();
        Self {
            base,
            fields: parts.map(|s| s.to_string()).collect(),
        }
    }

    pub fn child(&self, field: impl Into<String>) -> Self {
        let mut fields = self.fields.clone();
        fields.push(field.into());
        Self {
            base: self.base.clone(),
            fields,
        }
    }

    /// Widen to the configured maximum depth
    pub fn truncated(mut self, max_depth: usize) -> Self {
        self.fields.truncate(max_depth);
        self
    }

    pub fn is_var(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when self is a prefix of (or equal to) other
    pub fn covers(&self, other: &AccessPath) -> bool {
        self.base == other.base
            && self.fields.len() <= other.fields.len()
            && self.fields.iter().zip(other.fields.iter()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.base)?;
        for field in &self.fields {
            write!(f, ".{}", field)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = AccessPath::parse("req.GET.id");
        assert_eq!(path.base, "req");
        assert_eq!(path.fields, vec!["GET", "id"]);
        assert_eq!(path.to_string(), "req.GET.id");
    }

    #[test]
    fn test_truncation_widens() {
        let path = AccessPath::parse("a.b.c.d.e").truncated(2);
        assert_eq!(path.to_string(), "a.b.c");
    }

    #[test]
    fn test_covers() {
        let whole = AccessPath::var("obj");
        let field = AccessPath::field("obj", "name");
        assert!(whole.covers(&field));
        assert!(!field.covers(&whole));
        assert!(!AccessPath::var("other").covers(&field));
    }
}
