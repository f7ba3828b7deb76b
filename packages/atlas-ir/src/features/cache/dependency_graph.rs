//! Reverse dependency graph for incremental invalidation
//!
//! Edges run dependency → dependent, so BFS from a changed file walks
//! the files whose artifacts must be rebuilt.

use crate::features::cache::Fingerprint;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::{HashSet, VecDeque};

/// File node in the dependency graph
#[derive(Debug, Clone)]
pub struct FileNode {
    pub path: String,
    pub fingerprint: Fingerprint,
}

/// Result of an affected-set expansion
#[derive(Debug, Clone, Default)]
pub struct AffectedSet {
    pub files: HashSet<String>,
    /// True when the depth bound cut the expansion short
    pub truncated: bool,
    /// Files on the frontier when the bound was hit
    pub frontier: usize,
}

/// Reverse dependency graph
pub struct DependencyGraph {
    graph: DiGraph<FileNode, ()>,
    node_of: FxHashMap<String, NodeIndex>,
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_of: FxHashMap::default(),
        }
    }

    fn ensure_node(&mut self, path: &str) -> NodeIndex {
        if let Some(idx) = self.node_of.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(FileNode {
            path: path.to_string(),
            fingerprint: Fingerprint::zero(),
        });
        self.node_of.insert(path.to_string(), idx);
        idx
    }

    /// Register a file with its dependencies (files it imports).
    ///
    /// Re-registering replaces the file's dependency edges.
    pub fn register_file(&mut self, path: &str, fingerprint: Fingerprint, dependencies: &[String]) {
        let idx = self.ensure_node(path);
        self.graph[idx].fingerprint = fingerprint;

        // Drop stale dep → file edges before re-adding
        let stale: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        for dep in dependencies {
            if dep == path {
                continue;
            }
            let dep_idx = self.ensure_node(dep);
            self.graph.add_edge(dep_idx, idx, ());
        }
    }

    pub fn fingerprint_of(&self, path: &str) -> Option<Fingerprint> {
        self.node_of.get(path).map(|idx| self.graph[*idx].fingerprint)
    }

    /// Direct dependents of a file
    pub fn dependents_of(&self, path: &str) -> Vec<String> {
        let Some(idx) = self.node_of.get(path) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(*idx, Direction::Outgoing)
            .map(|n| self.graph[n].path.clone())
            .collect()
    }

    /// BFS expansion from the changed files to the affected set.
    ///
    /// `depth_bound` of None walks to closure; a bound marks the result
    /// truncated when dependents remain past the horizon.
    pub fn affected_from(&self, changed: &[String], depth_bound: Option<usize>) -> AffectedSet {
        let mut affected: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

        for path in changed {
            affected.insert(path.clone());
            if let Some(idx) = self.node_of.get(path) {
                queue.push_back((*idx, 0));
            }
        }

        let mut truncated = false;
        let mut frontier = 0usize;

        while let Some((idx, depth)) = queue.pop_front() {
            if let Some(bound) = depth_bound {
                if depth >= bound {
                    let remaining = self
                        .graph
                        .neighbors_directed(idx, Direction::Outgoing)
                        .filter(|n| !affected.contains(&self.graph[*n].path))
                        .count();
                    if remaining > 0 {
                        truncated = true;
                        frontier += remaining;
                    }
                    continue;
                }
            }

            for dependent in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                let path = &self.graph[dependent].path;
                if affected.insert(path.clone()) {
                    queue.push_back((dependent, depth + 1));
                }
            }
        }

        AffectedSet {
            files: affected,
            truncated,
            frontier,
        }
    }

    pub fn file_count(&self) -> usize {
        self.node_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(content: &str) -> Fingerprint {
        Fingerprint::compute(content.as_bytes())
    }

    /// c imports b imports a
    fn chain_graph() -> DependencyGraph {
        let mut g = DependencyGraph::new();
        g.register_file("a.py", fp("a"), &[]);
        g.register_file("b.py", fp("b"), &["a.py".into()]);
        g.register_file("c.py", fp("c"), &["b.py".into()]);
        g
    }

    #[test]
    fn test_dependents() {
        let g = chain_graph();
        assert_eq!(g.dependents_of("a.py"), vec!["b.py".to_string()]);
        assert!(g.dependents_of("c.py").is_empty());
    }

    #[test]
    fn test_affected_unbounded() {
        let g = chain_graph();
        let affected = g.affected_from(&["a.py".into()], None);
        assert_eq!(affected.files.len(), 3);
        assert!(!affected.truncated);
    }

    #[test]
    fn test_affected_depth_bound() {
        let g = chain_graph();
        let affected = g.affected_from(&["a.py".into()], Some(1));
        assert_eq!(affected.files.len(), 2);
        assert!(affected.truncated);
        assert!(affected.frontier >= 1);
    }

    #[test]
    fn test_leaf_change_affects_only_itself() {
        let g = chain_graph();
        let affected = g.affected_from(&["c.py".into()], None);
        assert_eq!(affected.files.len(), 1);
    }

    #[test]
    fn test_reregister_replaces_edges() {
        let mut g = chain_graph();
        // b.py no longer imports a.py
        g.register_file("b.py", fp("b2"), &[]);
        let affected = g.affected_from(&["a.py".into()], None);
        assert_eq!(affected.files.len(), 1);
    }

    #[test]
    fn test_import_cycle_terminates() {
        let mut g = DependencyGraph::new();
        g.register_file("a.py", fp("a"), &["b.py".into()]);
        g.register_file("b.py", fp("b"), &["a.py".into()]);

        let affected = g.affected_from(&["a.py".into()], None);
        assert_eq!(affected.files.len(), 2);
    }
}
