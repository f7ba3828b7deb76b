//! Global context: the immutable cross-file view

use super::types::Symbol;
use crate::shared::models::Node;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Immutable after build; incremental updates produce a new context via
/// `apply_delta`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalContext {
    /// FQN → symbol
    pub symbol_index: HashMap<String, Arc<Symbol>>,

    /// File → files it depends on (imports/inherits)
    pub file_deps: HashMap<String, BTreeSet<String>>,

    /// Class node id → all ancestors (transitive closure)
    pub inheritance_closure: HashMap<String, Vec<String>>,

    /// Package path → files inside it
    pub package_index: HashMap<String, Vec<String>>,

    /// Unresolved target path → synthesized External node
    pub external_nodes: HashMap<String, Node>,
}

impl GlobalContext {
    pub fn resolve(&self, fqn: &str) -> Option<&Arc<Symbol>> {
        self.symbol_index.get(fqn)
    }

    /// Ancestors of a class (INHERITS*), O(depth) precomputed
    pub fn ancestors_of(&self, node_id: &str) -> &[String] {
        self.inheritance_closure
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Files that `file` depends on
    pub fn dependencies_of(&self, file: &str) -> Option<&BTreeSet<String>> {
        self.file_deps.get(file)
    }

    /// Reverse dependency lookup (files depending on `file`)
    pub fn dependents_of(&self, file: &str) -> Vec<String> {
        self.file_deps
            .iter()
            .filter(|(_, deps)| deps.contains(file))
            .map(|(f, _)| f.clone())
            .collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbol_index.len()
    }

    /// Transitive closure over a direct-parent map
    pub fn close_inheritance(direct: &HashMap<String, Vec<String>>) -> HashMap<String, Vec<String>> {
        let mut closure: HashMap<String, Vec<String>> = HashMap::new();

        for node in direct.keys() {
            let mut seen: HashSet<String> = HashSet::new();
            let mut stack: Vec<&String> = direct.get(node).map(|v| v.iter().collect()).unwrap_or_default();
            while let Some(parent) = stack.pop() {
                if seen.insert(parent.clone()) {
                    if let Some(grand) = direct.get(parent) {
                        stack.extend(grand.iter());
                    }
                }
            }
            let mut ancestors: Vec<String> = seen.into_iter().collect();
            ancestors.sort();
            closure.insert(node.clone(), ancestors);
        }

        closure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inheritance_closure_transitive() {
        let mut direct = HashMap::new();
        direct.insert("c".to_string(), vec!["b".to_string()]);
        direct.insert("b".to_string(), vec!["a".to_string()]);

        let closure = GlobalContext::close_inheritance(&direct);
        assert_eq!(closure["c"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(closure["b"], vec!["a".to_string()]);
    }

    #[test]
    fn test_inheritance_closure_cycle_terminates() {
        let mut direct = HashMap::new();
        direct.insert("a".to_string(), vec!["b".to_string()]);
        direct.insert("b".to_string(), vec!["a".to_string()]);

        let closure = GlobalContext::close_inheritance(&direct);
        assert!(closure["a"].contains(&"b".to_string()));
        assert!(closure["b"].contains(&"a".to_string()));
    }

    #[test]
    fn test_dependents_of() {
        let mut ctx = GlobalContext::default();
        ctx.file_deps.insert(
            "b.py".to_string(),
            ["a.py".to_string()].into_iter().collect(),
        );

        assert_eq!(ctx.dependents_of("a.py"), vec!["b.py".to_string()]);
        assert!(ctx.dependents_of("b.py").is_empty());
    }
}
