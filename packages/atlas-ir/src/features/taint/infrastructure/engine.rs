//! Interprocedural taint engine
//!
//! Worklist fixpoint per function over CFG blocks (FIFO with per-block
//! dirty bits), field-sensitive access-path state, and bottom-up
//! function summaries over the call-graph SCC condensation. Sanitizers
//! clear exactly the label they declare; unknown callees propagate
//! argument taint to their result (conservative top).

use crate::config::TaintConfig;
use crate::features::cross_file::CallGraph;
use crate::features::flow_graph::domain::FlowGraph;
use crate::features::flow_graph::infrastructure::BfgBuilder;
use crate::features::ir_build::domain::{ArgValue, FunctionBody, Stmt, StmtKind};
use crate::features::taint::domain::{
    FunctionSummary, ParamSink, ReturnedSource, RuleKind, Severity, TaintFinding, TraceStep,
};
use crate::features::taint::domain::rules::CompiledRules;
use crate::features::taint::infrastructure::access_path::AccessPath;
use crate::features::taint::ports::PathFeasibilityPort;
use lru::LruCache;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Taint provenance
#[derive(Debug, Clone, PartialEq)]
enum Origin {
    /// Introduced by a source rule
    Rule(usize),
    /// Flowed in through parameter i (summary mode)
    Param(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Taint {
    label: String,
    origin: Origin,
    trace: Vec<TraceStep>,
    sanitizers: Vec<String>,
}

type State = FxHashMap<AccessPath, Vec<Taint>>;

fn join_taints(into: &mut Vec<Taint>, from: &[Taint]) -> bool {
    let mut changed = false;
    for taint in from {
        if !into
            .iter()
            .any(|t| t.label == taint.label && t.origin == taint.origin)
        {
            into.push(taint.clone());
            changed = true;
        }
    }
    changed
}

fn join_state(into: &mut State, from: &State) -> bool {
    let mut changed = false;
    for (path, taints) in from {
        changed |= join_taints(into.entry(path.clone()).or_default(), taints);
    }
    changed
}

pub struct TaintEngine<'a> {
    rules: &'a CompiledRules,
    config: &'a TaintConfig,
    feasibility: Option<&'a dyn PathFeasibilityPort>,
    /// Bounded cache of built flow graphs (functions are re-visited
    /// once per SCC iteration)
    cfg_cache: std::cell::RefCell<LruCache<String, Arc<FlowGraph>>>,
}

impl<'a> TaintEngine<'a> {
    pub fn new(rules: &'a CompiledRules, config: &'a TaintConfig) -> Self {
        Self {
            rules,
            config,
            feasibility: None,
            cfg_cache: std::cell::RefCell::new(LruCache::new(
                NonZeroUsize::new(1024).unwrap(),
            )),
        }
    }

    pub fn with_feasibility(mut self, port: &'a dyn PathFeasibilityPort) -> Self {
        self.feasibility = Some(port);
        self
    }

    /// Run the analysis: summaries bottom-up, then a findings pass with
    /// stable summaries.
    pub fn analyze(
        &self,
        bodies: &[FunctionBody],
        call_graph: &CallGraph,
    ) -> (Vec<TaintFinding>, FxHashMap<String, FunctionSummary>) {
        let by_id: FxHashMap<&str, &FunctionBody> = bodies
            .iter()
            .map(|b| (b.function_id.as_str(), b))
            .collect();
        let by_fqn: FxHashMap<&str, &FunctionBody> = bodies
            .iter()
            .map(|b| (b.function_fqn.as_str(), b))
            .collect();

        // Callee-first processing order
        let mut sccs: Vec<Vec<&FunctionBody>> = Vec::new();
        for scc in call_graph.sccs() {
            let members: Vec<&FunctionBody> = scc
                .iter()
                .filter_map(|id| by_id.get(id.as_str()).copied())
                .collect();
            if !members.is_empty() {
                sccs.push(members);
            }
        }
        for body in bodies {
            if !call_graph.contains(&body.function_id) {
                sccs.push(vec![body]);
            }
        }

        // Phase 1: summaries to fixpoint per SCC
        let mut summaries: FxHashMap<String, FunctionSummary> = FxHashMap::default();
        for scc in &sccs {
            // Convergence: flow sets are finite and monotone
            loop {
                let mut changed = false;
                for body in scc {
                    let (summary, _) = self.analyze_function(body, &by_fqn, &summaries);
                    let entry = summaries
                        .entry(body.function_fqn.clone())
                        .or_insert_with(|| {
                            FunctionSummary::new(&body.function_id, &body.function_fqn)
                        });
                    changed |= entry.merge(summary);
                }
                if !changed {
                    break;
                }
            }
        }

        // Phase 2: findings with stable summaries
        let mut findings = Vec::new();
        for scc in &sccs {
            for body in scc {
                let (_, mut body_findings) = self.analyze_function(body, &by_fqn, &summaries);
                findings.append(&mut body_findings);
            }
        }

        findings.sort_by(|a, b| {
            (a.sink.file.as_str(), a.sink.span.start_line, &a.rule_id)
                .cmp(&(b.sink.file.as_str(), b.sink.span.start_line, &b.rule_id))
        });
        findings.dedup_by(|a, b| {
            a.rule_id == b.rule_id && a.sink == b.sink && a.source == b.source
        });

        (findings, summaries)
    }

    fn flow_graph_of(&self, body: &FunctionBody) -> Arc<FlowGraph> {
        let mut cache = self.cfg_cache.borrow_mut();
        if let Some(graph) = cache.get(&body.function_id) {
            return Arc::clone(graph);
        }
        let graph = Arc::new(BfgBuilder::build(body));
        cache.put(body.function_id.clone(), Arc::clone(&graph));
        graph
    }

    /// Intraprocedural worklist fixpoint over CFG blocks
    fn analyze_function(
        &self,
        body: &FunctionBody,
        by_fqn: &FxHashMap<&str, &FunctionBody>,
        summaries: &FxHashMap<String, FunctionSummary>,
    ) -> (FunctionSummary, Vec<TaintFinding>) {
        let graph = self.flow_graph_of(body);
        let (succ, pred) = graph.adjacency();
        let n = graph.blocks.len();

        let mut summary = FunctionSummary::new(&body.function_id, &body.function_fqn);
        let mut findings = Vec::new();

        // Entry state: parameters carry their positional marker
        let mut entry_state = State::default();
        for (i, param) in body.params.iter().enumerate() {
            entry_state.insert(
                AccessPath::var(param),
                vec![Taint {
                    label: format!("<param{}>", i),
                    origin: Origin::Param(i),
                    trace: vec![TraceStep::new(&body.file_path, body.span, "param")],
                    sanitizers: Vec::new(),
                }],
            );
        }

        let mut in_states: Vec<State> = vec![State::default(); n];
        in_states[graph.entry as usize] = entry_state;
        let mut out_states: Vec<State> = vec![State::default(); n];

        let mut worklist: VecDeque<u32> = VecDeque::new();
        let mut dirty = vec![false; n];
        worklist.push_back(graph.entry);
        dirty[graph.entry as usize] = true;

        let mut passes = 0usize;
        let max_passes = n * 16 + 64;

        while let Some(block_id) = worklist.pop_front() {
            dirty[block_id as usize] = false;
            passes += 1;
            if passes > max_passes {
                tracing::warn!(
                    "taint fixpoint bailed out in {}",
                    body.function_fqn
                );
                break;
            }

            // Meet: union of predecessor out states
            let mut state = in_states[block_id as usize].clone();
            for &p in &pred[block_id as usize] {
                join_state(&mut state, &out_states[p as usize]);
            }
            in_states[block_id as usize] = state.clone();

            // Transfer over the block's statements
            for &stmt_idx in &graph.blocks[block_id as usize].statements {
                let stmt = &graph.stmts[stmt_idx as usize];
                self.transfer(
                    body,
                    stmt,
                    &mut state,
                    by_fqn,
                    summaries,
                    &mut summary,
                    &mut findings,
                );
            }

            if out_states[block_id as usize] != state {
                out_states[block_id as usize] = state;
                for &s in &succ[block_id as usize] {
                    if !dirty[s as usize] {
                        dirty[s as usize] = true;
                        worklist.push_back(s);
                    }
                }
            }
        }

        (summary, findings)
    }

    #[allow(clippy::too_many_arguments)]
    fn transfer(
        &self,
        body: &FunctionBody,
        stmt: &Stmt,
        state: &mut State,
        by_fqn: &FxHashMap<&str, &FunctionBody>,
        summaries: &FxHashMap<String, FunctionSummary>,
        summary: &mut FunctionSummary,
        findings: &mut Vec<TaintFinding>,
    ) {
        let file = &body.file_path;
        let max_path = self.config.max_path_len.max(4);
        let max_fields = self.config.max_field_depth.max(1);

        let extend = |taint: &Taint, span: crate::shared::models::Span, action: &str| {
            let mut t = taint.clone();
            if t.trace.len() < max_path {
                t.trace.push(TraceStep::new(file, span, action));
            }
            t
        };

        // Taint flowing out of the right-hand side
        let mut rhs = Vec::new();

        // Plain variable reads
        for used in &stmt.uses {
            if let Some(taints) = state.get(&AccessPath::var(used)) {
                join_taints(&mut rhs, taints);
            }
        }

        // Field reads (field-sensitive plus widened base)
        for read in &stmt.field_reads {
            let path = AccessPath::parse(&format!("{}.{}", read.base, read.field))
                .truncated(max_fields);
            if let Some(taints) = state.get(&path) {
                join_taints(&mut rhs, taints);
            }
            let base = AccessPath::var(path.base.clone());
            if let Some(taints) = state.get(&base) {
                // Attribute access on a tainted base: null-deref sinks
                for (rule_idx, rule) in self.rules.attribute_sinks() {
                    for taint in taints {
                        match &taint.origin {
                            Origin::Rule(_) => {
                                if Self::label_matches(rule.labels.as_deref(), &taint.label) {
                                    findings.push(self.finding_from(
                                        rule_idx,
                                        taint,
                                        TraceStep::new(file, read.span, "sink"),
                                    ));
                                }
                            }
                            Origin::Param(p) => {
                                summary.param_sinks.push(ParamSink {
                                    param: *p,
                                    sink_rule_idx: rule_idx,
                                    labels: rule.labels.clone().unwrap_or_default(),
                                    trace: vec![TraceStep::new(file, read.span, "sink")],
                                    depth: 0,
                                });
                            }
                        }
                    }
                }
                join_taints(&mut rhs, taints);
            }
        }

        // Calls
        for call in &stmt.calls {
            let matched = self.rules.match_call(&call.callee, None);
            let mut result = Vec::new();

            // Argument taints by position
            let arg_taints: Vec<Vec<Taint>> = call
                .args
                .iter()
                .map(|arg| match arg {
                    ArgValue::Var(name) => state
                        .get(&AccessPath::var(name))
                        .cloned()
                        .unwrap_or_default(),
                    ArgValue::NoneLiteral => self
                        .rules
                        .none_sources()
                        .map(|(idx, rule)| Taint {
                            label: rule.label.clone(),
                            origin: Origin::Rule(idx),
                            trace: vec![TraceStep::new(file, call.span, "source")],
                            sanitizers: Vec::new(),
                        })
                        .collect(),
                    _ => Vec::new(),
                })
                .collect();

            let mut sanitized_here = false;
            for rule in &matched {
                let rule_idx = self
                    .rules
                    .rules
                    .iter()
                    .position(|r| r.id == rule.id)
                    .unwrap_or_default();
                match rule.kind {
                    RuleKind::Source => {
                        result.push(Taint {
                            label: rule.label.clone(),
                            origin: Origin::Rule(rule_idx),
                            trace: vec![TraceStep::new(file, call.span, "source")],
                            sanitizers: Vec::new(),
                        });
                    }
                    RuleKind::Sink => {
                        let checked: Vec<usize> = rule
                            .sink_args
                            .clone()
                            .unwrap_or_else(|| (0..call.args.len()).collect());
                        for arg_idx in checked {
                            for taint in arg_taints.get(arg_idx).into_iter().flatten() {
                                match &taint.origin {
                                    Origin::Rule(_) => {
                                        if Self::label_matches(
                                            rule.labels.as_deref(),
                                            &taint.label,
                                        ) {
                                            findings.push(self.finding_from(
                                                rule_idx,
                                                taint,
                                                TraceStep::new(file, call.span, "sink"),
                                            ));
                                        }
                                    }
                                    Origin::Param(p) => {
                                        summary.param_sinks.push(ParamSink {
                                            param: *p,
                                            sink_rule_idx: rule_idx,
                                            labels: rule.labels.clone().unwrap_or_default(),
                                            trace: vec![TraceStep::new(file, call.span, "sink")],
                                            depth: 0,
                                        });
                                    }
                                }
                            }
                        }
                    }
                    RuleKind::Sanitizer => {
                        sanitized_here = true;
                        summary.sanitizers_applied.push(rule.id.clone());
                        // Labels other than the sanitized one pass
                        // through, carrying the sanitizer on record
                        for taints in &arg_taints {
                            for taint in taints {
                                if taint.label != rule.label {
                                    let mut passed = extend(taint, call.span, "call");
                                    passed.sanitizers.push(rule.id.clone());
                                    result.push(passed);
                                }
                            }
                        }
                    }
                    RuleKind::Propagator => {
                        for taints in &arg_taints {
                            for taint in taints {
                                result.push(extend(taint, call.span, "call"));
                            }
                        }
                    }
                }
            }

            // Known callee: apply its summary
            let module = body
                .function_fqn
                .rsplit_once('.')
                .map(|(m, _)| m)
                .unwrap_or(&body.function_fqn);
            let shorthand = format!("{}.{}", module, call.callee);
            let callee_summary = by_fqn
                .get(call.callee.as_str())
                .or_else(|| by_fqn.get(shorthand.as_str()))
                .and_then(|b| summaries.get(b.function_fqn.as_str()));

            if let Some(callee_summary) = callee_summary {
                for &p in &callee_summary.param_to_return {
                    for taint in arg_taints.get(p).into_iter().flatten() {
                        result.push(extend(taint, call.span, "call"));
                    }
                }
                for source in &callee_summary.returned_sources {
                    let mut trace = source.trace.clone();
                    trace.truncate(max_path.saturating_sub(1));
                    trace.push(TraceStep::new(file, call.span, "call"));
                    result.push(Taint {
                        label: source.label.clone(),
                        origin: Origin::Rule(source.rule_idx),
                        trace,
                        sanitizers: Vec::new(),
                    });
                }
                for sink in &callee_summary.param_sinks {
                    for taint in arg_taints.get(sink.param).into_iter().flatten() {
                        let label_ok = sink.labels.is_empty()
                            || sink.labels.contains(&taint.label);
                        if !label_ok {
                            continue;
                        }
                        match &taint.origin {
                            Origin::Rule(_) => {
                                let mut composed = taint.clone();
                                composed
                                    .trace
                                    .extend(sink.trace.iter().cloned());
                                composed.trace.truncate(max_path);
                                let sink_step = composed
                                    .trace
                                    .last()
                                    .cloned()
                                    .unwrap_or_else(|| {
                                        TraceStep::new(file, call.span, "sink")
                                    });
                                findings.push(self.finding_from(
                                    sink.sink_rule_idx,
                                    &composed,
                                    sink_step,
                                ));
                            }
                            Origin::Param(p) => {
                                // Deeper contexts merge past the k bound
                                let depth = (sink.depth + 1).min(self.config.context_k);
                                let mut trace =
                                    vec![TraceStep::new(file, call.span, "call")];
                                trace.extend(sink.trace.iter().cloned());
                                trace.truncate(max_path);
                                summary.param_sinks.push(ParamSink {
                                    param: *p,
                                    sink_rule_idx: sink.sink_rule_idx,
                                    labels: sink.labels.clone(),
                                    trace,
                                    depth,
                                });
                            }
                        }
                    }
                }
            } else if matched.is_empty() && !sanitized_here {
                // Unknown callee: argument taint joins the result
                for taints in &arg_taints {
                    for taint in taints {
                        result.push(extend(taint, call.span, "call"));
                    }
                }
            }

            if let Some(bound) = &call.assigned_to {
                // Binding the result is the intermediate witness step
                let bound_taints: Vec<Taint> = result
                    .iter()
                    .map(|t| extend(t, stmt.span, "assign"))
                    .collect();
                let path = AccessPath::var(bound);
                let entry = state.entry(path).or_default();
                join_taints(entry, &bound_taints);
            } else {
                join_taints(&mut rhs, &result);
            }
        }

        // Returns feed the summary
        if stmt.kind == StmtKind::Return {
            for taint in &rhs {
                match &taint.origin {
                    Origin::Param(p) => {
                        if !summary.param_to_return.contains(p) {
                            summary.param_to_return.push(*p);
                        }
                    }
                    Origin::Rule(rule_idx) => {
                        if !summary
                            .returned_sources
                            .iter()
                            .any(|s| s.rule_idx == *rule_idx && s.label == taint.label)
                        {
                            summary.returned_sources.push(ReturnedSource {
                                label: taint.label.clone(),
                                rule_idx: *rule_idx,
                                trace: taint.trace.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Definitions receive the RHS taint
        let extended: Vec<Taint> = rhs
            .iter()
            .map(|t| extend(t, stmt.span, "assign"))
            .collect();
        for def in &stmt.defs {
            let path = AccessPath::var(def);
            match stmt.kind {
                // Direct assignment is a strong update
                StmtKind::Assign => {
                    let mut combined = extended.clone();
                    // Call results bound to this def were stored above
                    if let Some(existing) = state.get(&path) {
                        let bound_here = stmt
                            .calls
                            .iter()
                            .any(|c| c.assigned_to.as_deref() == Some(def.as_str()));
                        if bound_here {
                            join_taints(&mut combined, existing);
                        }
                    }
                    state.insert(path, combined);
                }
                _ => {
                    join_taints(state.entry(path).or_default(), &extended);
                }
            }
        }

        // Field writes taint the written path
        for write in &stmt.field_writes {
            let path = AccessPath::parse(&format!("{}.{}", write.base, write.field))
                .truncated(max_fields);
            join_taints(state.entry(path).or_default(), &extended);
        }
    }

    fn label_matches(allowed: Option<&[String]>, label: &str) -> bool {
        match allowed {
            Some(labels) => labels.iter().any(|l| l == label),
            None => true,
        }
    }

    fn finding_from(&self, sink_rule_idx: usize, taint: &Taint, sink_step: TraceStep) -> TaintFinding {
        let rule = self.rules.rule(sink_rule_idx);
        let mut path = taint.trace.clone();
        if path.last() != Some(&sink_step) {
            path.push(sink_step.clone());
        }
        path.truncate(self.config.max_path_len.max(4));

        let source = path
            .first()
            .cloned()
            .unwrap_or_else(|| sink_step.clone());

        // Path-sensitive pruning is an opt-in port; without a backend
        // every path is considered feasible
        if self.config.path_sensitive {
            if let Some(port) = self.feasibility {
                if !port.is_feasible(&[]) {
                    return TaintFinding {
                        rule_id: rule.id.clone(),
                        category: rule.category.clone().unwrap_or_default(),
                        severity: rule.severity.unwrap_or(Severity::Medium),
                        source,
                        sink: sink_step,
                        path,
                        sanitizers_encountered: taint.sanitizers.clone(),
                        confidence: 0.1,
                        cwe: rule.cwe.clone(),
                    };
                }
            }
        }

        let confidence = TaintFinding::confidence_for(path.len(), 0);
        TaintFinding {
            rule_id: rule.id.clone(),
            category: rule.category.clone().unwrap_or_default(),
            severity: rule.severity.unwrap_or(Severity::Medium),
            source,
            sink: sink_step,
            path,
            sanitizers_encountered: taint.sanitizers.clone(),
            confidence,
            cwe: rule.cwe.clone(),
        }
    }
}
