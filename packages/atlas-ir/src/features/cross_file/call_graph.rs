//! Call graph over resolved documents
//!
//! Nodes are callable node ids (file nodes stand in for module-level
//! code). Tarjan SCCs condense recursion so summaries can be computed
//! bottom-up; SCCs at the same topological level run concurrently.

use crate::features::ir_build::domain::IRDocument;
use crate::shared::models::{EdgeKind, NodeKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::HashSet;
use std::sync::Arc;

pub struct CallGraph {
    graph: DiGraph<String, ()>,
    node_of: FxHashMap<String, NodeIndex>,
}

impl CallGraph {
    pub fn build(documents: &[Arc<IRDocument>]) -> Self {
        let mut graph = DiGraph::new();
        let mut node_of: FxHashMap<String, NodeIndex> = FxHashMap::default();

        let mut callable_ids: HashSet<&str> = HashSet::new();
        for doc in documents {
            for node in &doc.nodes {
                if node.kind.is_callable() || node.kind == NodeKind::File {
                    callable_ids.insert(node.id.as_str());
                }
            }
        }

        let mut ensure = |graph: &mut DiGraph<String, ()>,
                          node_of: &mut FxHashMap<String, NodeIndex>,
                          id: &str| {
            *node_of
                .entry(id.to_string())
                .or_insert_with(|| graph.add_node(id.to_string()))
        };

        for doc in documents {
            for edge in &doc.edges {
                if edge.kind != EdgeKind::Calls {
                    continue;
                }
                // External callees stay out of the graph; their effect
                // is the conservative default at the call site
                if !callable_ids.contains(edge.target_id.as_str()) {
                    continue;
                }
                let from = ensure(&mut graph, &mut node_of, &edge.source_id);
                let to = ensure(&mut graph, &mut node_of, &edge.target_id);
                if !graph.contains_edge(from, to) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        Self { graph, node_of }
    }

    pub fn contains(&self, function_id: &str) -> bool {
        self.node_of.contains_key(function_id)
    }

    pub fn callees_of(&self, function_id: &str) -> Vec<String> {
        self.neighbors(function_id, Direction::Outgoing)
    }

    pub fn callers_of(&self, function_id: &str) -> Vec<String> {
        self.neighbors(function_id, Direction::Incoming)
    }

    fn neighbors(&self, function_id: &str, dir: Direction) -> Vec<String> {
        let Some(idx) = self.node_of.get(function_id) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(*idx, dir)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// SCCs in reverse topological order (callees before callers),
    /// members sorted for determinism
    pub fn sccs(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().map(|idx| self.graph[idx].clone()).collect();
                members.sort();
                members
            })
            .collect()
    }

    /// SCCs grouped into topological levels; level N only depends on
    /// levels < N, so each level's SCCs can run concurrently
    pub fn scc_levels(&self) -> Vec<Vec<Vec<String>>> {
        let sccs = tarjan_scc(&self.graph);
        let mut scc_of: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        for (i, scc) in sccs.iter().enumerate() {
            for idx in scc {
                scc_of.insert(*idx, i);
            }
        }

        // sccs arrive callees-first, so callee levels are final when read
        let mut level_of = vec![0usize; sccs.len()];
        for (i, scc) in sccs.iter().enumerate() {
            let mut level = 0;
            for idx in scc {
                for callee in self.graph.neighbors_directed(*idx, Direction::Outgoing) {
                    let callee_scc = scc_of[&callee];
                    if callee_scc != i {
                        level = level.max(level_of[callee_scc] + 1);
                    }
                }
            }
            level_of[i] = level;
        }

        let max_level = level_of.iter().copied().max().unwrap_or(0);
        let mut levels: Vec<Vec<Vec<String>>> = vec![Vec::new(); max_level + 1];
        for (i, scc) in sccs.iter().enumerate() {
            let mut members: Vec<String> =
                scc.iter().map(|idx| self.graph[*idx].clone()).collect();
            members.sort();
            levels[level_of[i]].push(members);
        }
        for level in &mut levels {
            level.sort();
        }
        levels
    }

    pub fn function_count(&self) -> usize {
        self.node_of.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cross_file::resolver::CrossFileResolver;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn resolved(sources: &[(&str, &str)]) -> Vec<Arc<IRDocument>> {
        let docs = sources
            .iter()
            .map(|(path, content)| {
                let file = SourceFile::new(*path, LanguageId::Python, *content);
                let tree = TreeSitterParser::new().parse(&file).unwrap();
                Arc::new(IrBuilder::new("repo", "snap").build(&file, &tree))
            })
            .collect();
        CrossFileResolver::resolve(docs).documents
    }

    #[test]
    fn test_call_edges_and_sccs() {
        let docs = resolved(&[(
            "m.py",
            "def a():\n    b()\n\ndef b():\n    a()\n\ndef c():\n    a()\n",
        )]);
        let graph = CallGraph::build(&docs);

        // a and b are mutually recursive: one SCC of size 2
        let sccs = graph.sccs();
        assert!(sccs.iter().any(|scc| scc.len() == 2));

        // The a/b SCC comes before the caller c (callees first)
        let ab_pos = sccs.iter().position(|scc| scc.len() == 2).unwrap();
        let c_id = docs[0]
            .nodes
            .iter()
            .find(|n| n.fqn == "m.c")
            .unwrap()
            .id
            .clone();
        let c_pos = sccs.iter().position(|scc| scc.contains(&c_id)).unwrap();
        assert!(ab_pos < c_pos);
    }

    #[test]
    fn test_scc_levels_partition() {
        let docs = resolved(&[(
            "m.py",
            "def leaf():\n    pass\n\ndef mid():\n    leaf()\n\ndef top():\n    mid()\n",
        )]);
        let graph = CallGraph::build(&docs);
        let levels = graph.scc_levels();

        // Levels are a partition of all SCC members
        let total: usize = levels.iter().flatten().map(|scc| scc.len()).sum();
        assert_eq!(total, graph.function_count());
        assert!(levels.len() >= 3);
    }
}
