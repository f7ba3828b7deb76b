//! Escape analysis
//!
//! Per-function lattice
//! NoEscape ⊑ ArgEscape ⊑ ReturnEscape ⊑ FieldEscape/ArrayEscape
//! ⊑ GlobalEscape ⊑ Unknown, joined pointwise (max by rank; the two
//! incomparable states join upward). Intraprocedural fixpoint first,
//! then interprocedural refinement bottom-up over call-graph SCCs.
//! Unknown callees join their arguments to Unknown.

use crate::features::cross_file::CallGraph;
use crate::features::ir_build::domain::{AllocKind, FunctionBody, StmtKind};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscapeState {
    NoEscape,
    ArgEscape,
    ReturnEscape,
    FieldEscape,
    ArrayEscape,
    GlobalEscape,
    Unknown,
}

impl EscapeState {
    pub fn rank(&self) -> u8 {
        match self {
            EscapeState::NoEscape => 0,
            EscapeState::ArgEscape => 1,
            EscapeState::ReturnEscape => 2,
            EscapeState::FieldEscape | EscapeState::ArrayEscape => 3,
            EscapeState::GlobalEscape => 4,
            EscapeState::Unknown => 5,
        }
    }

    /// Conservative join: pointwise max; Field and Array are
    /// incomparable, their join goes up to GlobalEscape
    pub fn join(self, other: EscapeState) -> EscapeState {
        if self == other {
            return self;
        }
        match self.rank().cmp(&other.rank()) {
            std::cmp::Ordering::Less => other,
            std::cmp::Ordering::Greater => self,
            std::cmp::Ordering::Equal => EscapeState::GlobalEscape,
        }
    }
}

/// Escape classification for one function's variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscapeInfo {
    pub function_id: String,
    pub function_fqn: String,
    pub states: HashMap<String, EscapeState>,
}

impl crate::features::cache::EstimateSize for EscapeInfo {
    fn estimated_size_bytes(&self) -> usize {
        self.states.len() * 48 + self.function_id.len()
    }
}

impl EscapeInfo {
    pub fn state_of(&self, var: &str) -> EscapeState {
        self.states
            .get(var)
            .copied()
            .unwrap_or(EscapeState::NoEscape)
    }

    /// True iff the allocation may be reachable from a field, array,
    /// or global after the function returns
    pub fn is_heap_escape(&self, var: &str) -> bool {
        self.state_of(var).rank() >= EscapeState::FieldEscape.rank()
    }

    /// True iff the allocation is confined to this call (at most
    /// passed down as an argument)
    pub fn is_thread_local(&self, var: &str) -> bool {
        self.state_of(var).rank() <= EscapeState::ArgEscape.rank()
    }
}

/// Per-function summary used by callers: state joined into each
/// argument position
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscapeSummary {
    pub param_states: Vec<EscapeState>,
}

pub struct EscapeAnalysis;

impl EscapeAnalysis {
    /// Analyze every body; refine interprocedurally over the SCC
    /// condensation of the call graph (callees first).
    pub fn analyze(
        bodies: &[FunctionBody],
        call_graph: &CallGraph,
    ) -> HashMap<String, EscapeInfo> {
        let by_id: FxHashMap<&str, &FunctionBody> = bodies
            .iter()
            .map(|b| (b.function_id.as_str(), b))
            .collect();
        let by_fqn: FxHashMap<&str, &FunctionBody> = bodies
            .iter()
            .map(|b| (b.function_fqn.as_str(), b))
            .collect();

        let mut infos: HashMap<String, EscapeInfo> = HashMap::new();
        let mut summaries: FxHashMap<String, EscapeSummary> = FxHashMap::default();

        // Callee-first order; functions outside the call graph follow
        let mut order: Vec<&str> = Vec::new();
        for scc in call_graph.sccs() {
            for member in &scc {
                if by_id.contains_key(member.as_str()) {
                    order.push(by_id[member.as_str()].function_id.as_str());
                }
            }
        }
        for body in bodies {
            if !call_graph.contains(&body.function_id) {
                order.push(body.function_id.as_str());
            }
        }

        for function_id in order {
            let Some(body) = by_id.get(function_id) else {
                continue;
            };
            let info = Self::analyze_function(body, &by_fqn, &summaries);
            let summary = EscapeSummary {
                param_states: body
                    .params
                    .iter()
                    .map(|p| info.state_of(p))
                    .collect(),
            };
            summaries.insert(body.function_fqn.clone(), summary);
            infos.insert(body.function_id.clone(), info);
        }

        infos
    }

    fn analyze_function(
        body: &FunctionBody,
        by_fqn: &FxHashMap<&str, &FunctionBody>,
        summaries: &FxHashMap<String, EscapeSummary>,
    ) -> EscapeInfo {
        let mut states: FxHashMap<String, EscapeState> = FxHashMap::default();
        // (a, b) alias pairs from copies and captures; states flow both ways
        let mut links: Vec<(String, String)> = Vec::new();

        let mut join = |states: &mut FxHashMap<String, EscapeState>, var: &str, s: EscapeState| {
            let entry = states
                .entry(var.to_string())
                .or_insert(EscapeState::NoEscape);
            *entry = entry.join(s);
        };

        for stmt in body.iter_preorder() {
            match stmt.kind {
                StmtKind::Return => {
                    for used in &stmt.uses {
                        join(&mut states, used, EscapeState::ReturnEscape);
                    }
                    for alloc in &stmt.allocs {
                        if let Some(var) = &alloc.var {
                            join(&mut states, var, EscapeState::ReturnEscape);
                        }
                    }
                }
                StmtKind::Assign if stmt.calls.is_empty()
                    && stmt.allocs.is_empty()
                    && stmt.field_reads.is_empty()
                    && stmt.field_writes.is_empty() =>
                {
                    for def in &stmt.defs {
                        for used in &stmt.uses {
                            links.push((def.clone(), used.clone()));
                        }
                    }
                }
                _ => {}
            }

            // Stores into fields and containers
            for write in &stmt.field_writes {
                let root = write.base.split('.').next().unwrap_or(&write.base);
                let container_state = if body.params.contains(&root.to_string()) {
                    // Stored into a caller-visible object
                    EscapeState::FieldEscape
                } else if states.contains_key(root) || stmt.defs.contains(&root.to_string()) {
                    if write.field == "[]" {
                        EscapeState::ArrayEscape
                    } else {
                        EscapeState::FieldEscape
                    }
                } else {
                    // Unknown base, likely module/global state
                    EscapeState::GlobalEscape
                };
                for used in &stmt.uses {
                    if used != root {
                        join(&mut states, used, container_state);
                    }
                }
                // Escaping the container escapes what it holds
                links.extend(
                    stmt.uses
                        .iter()
                        .filter(|u| *u != root)
                        .map(|u| (root.to_string(), u.clone())),
                );
            }

            // Closure captures alias the closure value
            for alloc in &stmt.allocs {
                if alloc.kind == AllocKind::Closure {
                    if let Some(var) = &alloc.var {
                        for captured in &alloc.captures {
                            links.push((var.clone(), captured.clone()));
                        }
                    }
                }
            }

            // Call arguments
            for call in &stmt.calls {
                let module = body
                    .function_fqn
                    .rsplit_once('.')
                    .map(|(m, _)| m)
                    .unwrap_or(&body.function_fqn);
                let shorthand = format!("{}.{}", module, call.callee);
                let summary = by_fqn
                    .get(call.callee.as_str())
                    .or_else(|| by_fqn.get(shorthand.as_str()))
                    .and_then(|b| summaries.get(b.function_fqn.as_str()));

                for (i, arg) in call.args.iter().enumerate() {
                    let Some(arg_name) = arg.as_var() else { continue };
                    let state = match summary {
                        Some(summary) => summary
                            .param_states
                            .get(i)
                            .copied()
                            .unwrap_or(EscapeState::ArgEscape)
                            .join(EscapeState::ArgEscape),
                        // Unknown call: conservative top
                        None => EscapeState::Unknown,
                    };
                    join(&mut states, arg_name, state);
                }
            }
        }

        // Propagate along alias links to fixpoint (lattice is finite)
        let mut changed = true;
        while changed {
            changed = false;
            for (a, b) in &links {
                let sa = states.get(a).copied().unwrap_or(EscapeState::NoEscape);
                let sb = states.get(b).copied().unwrap_or(EscapeState::NoEscape);
                let joined = sa.join(sb);
                if joined != sa {
                    states.insert(a.clone(), joined);
                    changed = true;
                }
                if joined != sb {
                    states.insert(b.clone(), joined);
                    changed = true;
                }
            }
        }

        // Every defined variable gets an entry
        for stmt in body.iter_preorder() {
            for def in &stmt.defs {
                states.entry(def.clone()).or_insert(EscapeState::NoEscape);
            }
        }

        EscapeInfo {
            function_id: body.function_id.clone(),
            function_fqn: body.function_fqn.clone(),
            states: states.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cross_file::CrossFileResolver;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};
    use std::sync::Arc;

    fn analyze(content: &str) -> HashMap<String, EscapeInfo> {
        let file = SourceFile::new("m.py", LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = Arc::new(IrBuilder::new("repo", "snap").build(&file, &tree));
        let output = CrossFileResolver::resolve(vec![doc]);
        let bodies: Vec<FunctionBody> = output
            .documents
            .iter()
            .flat_map(|d| d.bodies.clone())
            .collect();
        let call_graph = CallGraph::build(&output.documents);
        EscapeAnalysis::analyze(&bodies, &call_graph)
    }

    fn info_of<'a>(
        infos: &'a HashMap<String, EscapeInfo>,
        fqn: &str,
        var: &str,
    ) -> &'a EscapeInfo {
        infos
            .values()
            .find(|i| i.function_fqn == fqn && i.states.contains_key(var))
            .expect("function info present")
    }

    #[test]
    fn test_lattice_join() {
        use EscapeState::*;
        assert_eq!(NoEscape.join(ArgEscape), ArgEscape);
        assert_eq!(ReturnEscape.join(ArgEscape), ReturnEscape);
        assert_eq!(FieldEscape.join(ArrayEscape), GlobalEscape);
        assert_eq!(Unknown.join(GlobalEscape), Unknown);
    }

    #[test]
    fn test_local_allocation_does_not_escape() {
        let infos = analyze("def f():\n    d = {}\n    x = 1\n    return x\n");
        let info = info_of(&infos, "m.f", "d");
        assert_eq!(info.state_of("d"), EscapeState::NoEscape);
        assert!(info.is_thread_local("d"));
        assert!(!info.is_heap_escape("d"));
    }

    #[test]
    fn test_returned_allocation_is_return_escape() {
        let infos = analyze("def f():\n    d = {}\n    return d\n");
        let info = info_of(&infos, "m.f", "d");
        assert_eq!(info.state_of("d"), EscapeState::ReturnEscape);
    }

    #[test]
    fn test_closure_capture_returned() {
        // Allocate a dict, store it in a closure, return the closure
        let infos = analyze(
            "def f():\n    d = {}\n    def g():\n        return d\n    return g\n",
        );
        let info = info_of(&infos, "m.f", "d");
        assert_eq!(info.state_of("d"), EscapeState::ReturnEscape);
        assert!(!info.is_thread_local("d"));
        assert!(!info.is_heap_escape("d"));
    }

    #[test]
    fn test_unknown_call_joins_unknown() {
        let infos = analyze("def f():\n    d = {}\n    sink(d)\n");
        let info = info_of(&infos, "m.f", "d");
        assert_eq!(info.state_of("d"), EscapeState::Unknown);
    }

    #[test]
    fn test_known_callee_refines_argument() {
        let infos = analyze(
            "def use(v):\n    x = v\n\ndef f():\n    d = {}\n    use(d)\n",
        );
        let info = info_of(&infos, "m.f", "d");
        // Callee does not escape its parameter: argument stays thread-local
        assert_eq!(info.state_of("d"), EscapeState::ArgEscape);
        assert!(info.is_thread_local("d"));
    }
}
