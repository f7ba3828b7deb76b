//! Andersen-style inclusion-constraint solver
//!
//! Subset edges over variable indices, bitmap points-to sets, and
//! field-sensitive load/store handling. Copy cycles are collapsed with
//! an iterative Tarjan pass between propagation rounds; the outer loop
//! re-runs until load/store processing stops producing new edges.

use crate::features::ir_build::domain::{AllocKind, FunctionBody, Stmt, StmtKind};
use crate::features::points_to::domain::{
    AbstractLocation, Constraint, LocationId, LocationKind, PointsToGraph, VarId,
};
use crate::features::points_to::infrastructure::sparse_bitmap::SparseBitmap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::HashMap;
use std::collections::VecDeque;

pub struct AndersenSolver {
    var_names: Vec<String>,
    var_ids: FxHashMap<String, VarId>,
    locations: Vec<AbstractLocation>,
    constraints: Vec<Constraint>,
}

impl AndersenSolver {
    pub fn new() -> Self {
        Self {
            var_names: Vec::new(),
            var_ids: FxHashMap::default(),
            locations: Vec::new(),
            constraints: Vec::new(),
        }
    }

    fn var(&mut self, scope: &str, name: &str) -> VarId {
        let key = format!("{}::{}", scope, name);
        if let Some(&id) = self.var_ids.get(&key) {
            return id;
        }
        let id = self.var_names.len() as VarId;
        self.var_names.push(key.clone());
        self.var_ids.insert(key, id);
        id
    }

    fn location(&mut self, kind: LocationKind, function_id: &str, span: crate::shared::models::Span) -> LocationId {
        let id = self.locations.len() as LocationId;
        self.locations.push(AbstractLocation {
            id,
            kind,
            function_id: function_id.to_string(),
            span,
        });
        id
    }

    /// Generate constraints from function bodies.
    ///
    /// `bodies_by_fqn` lets resolved intra-repo calls link arguments to
    /// parameters and results to returns.
    pub fn add_bodies(&mut self, bodies: &[&FunctionBody], bodies_by_fqn: &HashMap<String, &FunctionBody>) {
        for body in bodies {
            let scope = body.function_fqn.clone();
            for stmt in body.iter_preorder() {
                self.add_stmt(&scope, body, stmt, bodies_by_fqn);
            }
        }
    }

    fn add_stmt(
        &mut self,
        scope: &str,
        body: &FunctionBody,
        stmt: &Stmt,
        bodies_by_fqn: &HashMap<String, &FunctionBody>,
    ) {
        // Allocation sites
        for alloc in &stmt.allocs {
            let loc = self.location(
                LocationKind::Heap(alloc.kind),
                &body.function_id,
                alloc.span,
            );
            let lhs = match (&alloc.var, stmt.kind) {
                (Some(var), _) => self.var(scope, var),
                (None, StmtKind::Return) => self.var(scope, "<ret>"),
                (None, _) => self.var(scope, &format!("<tmp_{}_{}>", alloc.span.start_line, alloc.span.start_col)),
            };
            self.constraints.push(Constraint::AddressOf {
                lhs,
                location: loc,
            });

            // A closure holds its captures
            if alloc.kind == AllocKind::Closure {
                for captured in &alloc.captures {
                    let rhs = self.var(scope, captured);
                    self.constraints.push(Constraint::Store {
                        base: lhs,
                        field: "<capture>".to_string(),
                        rhs,
                    });
                }
            }
        }

        // Field reads feeding a definition
        if !stmt.field_reads.is_empty() {
            for def in &stmt.defs {
                let lhs = self.var(scope, def);
                for read in &stmt.field_reads {
                    let root = read.base.split('.').next().unwrap_or(&read.base);
                    let base = self.var(scope, root);
                    self.constraints.push(Constraint::Load {
                        lhs,
                        base,
                        field: read.field.clone(),
                    });
                }
            }
        }

        // Field writes
        for write in &stmt.field_writes {
            let root = write.base.split('.').next().unwrap_or(&write.base);
            let base = self.var(scope, root);
            for used in &stmt.uses {
                if used == root {
                    continue;
                }
                let rhs = self.var(scope, used);
                self.constraints.push(Constraint::Store {
                    base,
                    field: write.field.clone(),
                    rhs,
                });
            }
        }

        // Plain copies
        if stmt.kind == StmtKind::Assign
            && stmt.calls.is_empty()
            && stmt.allocs.is_empty()
            && stmt.field_reads.is_empty()
            && stmt.field_writes.is_empty()
        {
            for def in &stmt.defs {
                let lhs = self.var(scope, def);
                for used in &stmt.uses {
                    let rhs = self.var(scope, used);
                    self.constraints.push(Constraint::Copy { lhs, rhs });
                }
            }
        }

        // Returns flow into the synthetic return variable
        if stmt.kind == StmtKind::Return {
            let ret = self.var(scope, "<ret>");
            for used in &stmt.uses {
                let rhs = self.var(scope, used);
                self.constraints.push(Constraint::Copy { lhs: ret, rhs });
            }
        }

        // Resolved calls: arguments to parameters, returns to results
        for call in &stmt.calls {
            let candidates = [
                call.callee.clone(),
                format!(
                    "{}.{}",
                    scope.rsplit_once('.').map(|(m, _)| m).unwrap_or(scope),
                    call.callee
                ),
            ];
            let callee = candidates
                .iter()
                .find_map(|c| bodies_by_fqn.get(c.as_str()));
            let Some(callee) = callee else { continue };
            let callee_scope = callee.function_fqn.clone();

            for (i, arg) in call.args.iter().enumerate() {
                if let (Some(arg_name), Some(param)) = (arg.as_var(), callee.params.get(i)) {
                    let rhs = self.var(scope, arg_name);
                    let lhs = self.var(&callee_scope, param);
                    self.constraints.push(Constraint::Copy { lhs, rhs });
                }
            }
            if let Some(result) = &call.assigned_to {
                let lhs = self.var(scope, result);
                let rhs = self.var(&callee_scope, "<ret>");
                self.constraints.push(Constraint::Copy { lhs, rhs });
            }
        }
    }

    /// Solve to fixpoint
    pub fn solve(mut self) -> PointsToGraph {
        let mut pts: Vec<SparseBitmap> = vec![SparseBitmap::new(); self.var_names.len()];
        let mut succ: Vec<FxHashSet<VarId>> = vec![FxHashSet::default(); self.var_names.len()];
        let mut loads: Vec<Vec<(VarId, String)>> = vec![Vec::new(); self.var_names.len()];
        let mut stores: Vec<Vec<(String, VarId)>> = vec![Vec::new(); self.var_names.len()];
        let mut rep: Vec<VarId> = (0..self.var_names.len() as VarId).collect();
        let mut field_vars: FxHashMap<(LocationId, String), VarId> = FxHashMap::default();

        fn find(rep: &mut [VarId], v: VarId) -> VarId {
            let mut root = v;
            while rep[root as usize] != root {
                root = rep[root as usize];
            }
            let mut cur = v;
            while rep[cur as usize] != root {
                let next = rep[cur as usize];
                rep[cur as usize] = root;
                cur = next;
            }
            root
        }

        let mut worklist: VecDeque<VarId> = VecDeque::new();

        for constraint in std::mem::take(&mut self.constraints) {
            match constraint {
                Constraint::AddressOf { lhs, location } => {
                    if pts[lhs as usize].insert(location) {
                        worklist.push_back(lhs);
                    }
                }
                Constraint::Copy { lhs, rhs } => {
                    succ[rhs as usize].insert(lhs);
                }
                Constraint::Load { lhs, base, field } => {
                    loads[base as usize].push((lhs, field));
                }
                Constraint::Store { base, field, rhs } => {
                    stores[base as usize].push((field, rhs));
                }
            }
        }

        // Seed: everything with a points-to set propagates once
        for v in 0..pts.len() as VarId {
            if !pts[v as usize].is_empty() {
                worklist.push_back(v);
            }
        }

        loop {
            let mut new_edges = false;

            // Collapse copy cycles so mutual subset edges share one set
            Self::collapse_cycles(&succ, &mut rep, &mut pts);

            // Inner propagation to fixpoint
            while let Some(v) = worklist.pop_front() {
                let v = find(&mut rep, v);
                let v_pts = pts[v as usize].clone();

                // Loads: lhs ⊇ pts(fieldvar(l, f)) for every l ∈ pts(v)
                let load_list = loads[v as usize].clone();
                for (lhs, field) in load_list {
                    for l in v_pts.iter() {
                        let fv = *field_vars
                            .entry((l, field.clone()))
                            .or_insert_with(|| {
                                let id = pts.len() as VarId;
                                pts.push(SparseBitmap::new());
                                succ.push(FxHashSet::default());
                                loads.push(Vec::new());
                                stores.push(Vec::new());
                                rep.push(id);
                                id
                            });
                        let lhs_r = find(&mut rep, lhs);
                        if succ[fv as usize].insert(lhs_r) {
                            new_edges = true;
                            let fv_pts = pts[fv as usize].clone();
                            if pts[lhs_r as usize].union_with(&fv_pts) {
                                worklist.push_back(lhs_r);
                            }
                        }
                    }
                }

                // Stores: fieldvar(l, f) ⊇ pts(rhs) for every l ∈ pts(v)
                let store_list = stores[v as usize].clone();
                for (field, rhs) in store_list {
                    for l in v_pts.iter() {
                        let fv = *field_vars
                            .entry((l, field.clone()))
                            .or_insert_with(|| {
                                let id = pts.len() as VarId;
                                pts.push(SparseBitmap::new());
                                succ.push(FxHashSet::default());
                                loads.push(Vec::new());
                                stores.push(Vec::new());
                                rep.push(id);
                                id
                            });
                        let rhs_r = find(&mut rep, rhs);
                        if succ[rhs_r as usize].insert(fv) {
                            new_edges = true;
                            let rhs_pts = pts[rhs_r as usize].clone();
                            if pts[fv as usize].union_with(&rhs_pts) {
                                worklist.push_back(fv);
                            }
                        }
                    }
                }

                // Subset edges
                let targets: Vec<VarId> = succ[v as usize].iter().copied().collect();
                for w in targets {
                    let w = find(&mut rep, w);
                    if w == v {
                        continue;
                    }
                    if pts[w as usize].union_with(&v_pts) {
                        worklist.push_back(w);
                    }
                }
            }

            if !new_edges {
                break;
            }
            // New load/store edges can enable further flow
            for v in 0..pts.len() as VarId {
                if !pts[v as usize].is_empty() {
                    worklist.push_back(v);
                }
            }
        }

        // Assemble the result graph
        let mut graph = PointsToGraph::new();
        for location in self.locations {
            graph.add_location(location);
        }
        for (name, id) in &self.var_ids {
            graph.set_var_id(name.clone(), *id);
        }
        let var_count = self.var_ids.len();
        let mut sccs = 0;
        for v in 0..pts.len() as VarId {
            let r = find(&mut rep, v);
            if r != v {
                graph.set_scc(v, r);
                sccs += 1;
            }
        }
        graph.stats.scc_count = sccs;
        for v in 0..pts.len() as VarId {
            if find(&mut rep, v) == v && !pts[v as usize].is_empty() {
                graph.set_points_to(v, pts[v as usize].clone());
            }
        }
        graph.stats.total_variables = var_count;
        graph
    }

    /// Iterative Tarjan over the copy-edge graph; members of one SCC
    /// merge into a single representative
    fn collapse_cycles(
        succ: &[FxHashSet<VarId>],
        rep: &mut [VarId],
        pts: &mut [SparseBitmap],
    ) {
        let n = succ.len();
        let mut index = vec![u32::MAX; n];
        let mut lowlink = vec![0u32; n];
        let mut on_stack = vec![false; n];
        let mut stack: Vec<u32> = Vec::new();
        let mut next_index = 0u32;

        // Explicit DFS frames: (node, neighbor iterator position)
        for start in 0..n as u32 {
            if index[start as usize] != u32::MAX {
                continue;
            }
            let mut frames: Vec<(u32, Vec<u32>, usize)> = Vec::new();
            let neighbors: Vec<u32> = succ[start as usize].iter().copied().collect();
            index[start as usize] = next_index;
            lowlink[start as usize] = next_index;
            next_index += 1;
            stack.push(start);
            on_stack[start as usize] = true;
            frames.push((start, neighbors, 0));

            while let Some((node, neighbors, pos)) = frames.last_mut() {
                if *pos < neighbors.len() {
                    let next = neighbors[*pos];
                    *pos += 1;
                    let node = *node;
                    if index[next as usize] == u32::MAX {
                        index[next as usize] = next_index;
                        lowlink[next as usize] = next_index;
                        next_index += 1;
                        stack.push(next);
                        on_stack[next as usize] = true;
                        let next_neighbors: Vec<u32> =
                            succ[next as usize].iter().copied().collect();
                        frames.push((next, next_neighbors, 0));
                    } else if on_stack[next as usize] {
                        lowlink[node as usize] =
                            lowlink[node as usize].min(index[next as usize]);
                    }
                } else {
                    let node = *node;
                    frames.pop();
                    if let Some((parent, _, _)) = frames.last() {
                        lowlink[*parent as usize] =
                            lowlink[*parent as usize].min(lowlink[node as usize]);
                    }
                    if lowlink[node as usize] == index[node as usize] {
                        // Pop the SCC; merge members into the root
                        let mut members = Vec::new();
                        while let Some(member) = stack.pop() {
                            on_stack[member as usize] = false;
                            members.push(member);
                            if member == node {
                                break;
                            }
                        }
                        if members.len() > 1 {
                            let root = *members.iter().min().unwrap();
                            let mut merged = SparseBitmap::new();
                            for &member in &members {
                                merged.union_with(&pts[member as usize]);
                            }
                            for &member in &members {
                                rep[member as usize] = root;
                            }
                            pts[root as usize] = merged;
                        }
                    }
                }
            }
        }
    }
}

impl Default for AndersenSolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_build::IrBuilder;
    use crate::features::parsing::{SourceParser, TreeSitterParser};
    use crate::shared::models::{LanguageId, SourceFile};

    fn points_to(content: &str) -> PointsToGraph {
        let file = SourceFile::new("m.py", LanguageId::Python, content);
        let tree = TreeSitterParser::new().parse(&file).unwrap();
        let doc = IrBuilder::new("repo", "snap").build(&file, &tree);

        let mut solver = AndersenSolver::new();
        let bodies: Vec<&FunctionBody> = doc.bodies.iter().collect();
        let by_fqn: HashMap<String, &FunctionBody> = doc
            .bodies
            .iter()
            .map(|b| (b.function_fqn.clone(), b))
            .collect();
        solver.add_bodies(&bodies, &by_fqn);
        solver.solve()
    }

    #[test]
    fn test_direct_allocation() {
        let graph = points_to("def f():\n    d = {}\n    return d\n");
        let set = graph.points_to_by_name("m.f::d").unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_copy_propagates() {
        let graph = points_to("def f():\n    d = {}\n    e = d\n    return e\n");
        let d = graph.var_id("m.f::d").unwrap();
        let e = graph.var_id("m.f::e").unwrap();
        assert!(graph.may_alias(d, e));
    }

    #[test]
    fn test_return_flows_to_ret_var() {
        let graph = points_to("def f():\n    d = {}\n    return d\n");
        let ret = graph.points_to_by_name("m.f::<ret>").unwrap();
        assert_eq!(ret.len(), 1);
    }

    #[test]
    fn test_interprocedural_result() {
        let graph = points_to(
            "def make():\n    d = {}\n    return d\n\ndef use():\n    x = make()\n    return x\n",
        );
        let d = graph.var_id("m.make::d").unwrap();
        let x = graph.var_id("m.use::x").unwrap();
        assert!(graph.may_alias(d, x));
    }

    #[test]
    fn test_copy_cycle_collapses() {
        let graph = points_to(
            "def f():\n    a = {}\n    b = a\n    a = b\n    return a\n",
        );
        let a = graph.var_id("m.f::a").unwrap();
        let b = graph.var_id("m.f::b").unwrap();
        assert!(graph.may_alias(a, b));
    }
}
