//! Incremental planning
//!
//! Turns (change set, per-file impact) into the affected set. IR_LOCAL
//! changes stay confined to their file; SIGNATURE/STRUCTURAL changes
//! expand over the reverse dependency graph with the mode's depth
//! bound, escalating automatically when the bound truncates more
//! dependents than the configured threshold.

use super::change_set::ChangeSet;
use super::impact::ImpactLevel;
use crate::config::{IncrementalConfig, IncrementalMode};
use crate::features::cache::DependencyGraph;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncrementalPlan {
    pub change_set: ChangeSet,
    /// Files whose artifacts must be rebuilt
    pub affected: BTreeSet<String>,
    /// Mode actually used after escalation
    pub mode_used: IncrementalMode,
    pub escalated: bool,
}

pub struct IncrementalController {
    config: IncrementalConfig,
}

impl IncrementalController {
    pub fn new(config: IncrementalConfig) -> Self {
        Self { config }
    }

    pub fn plan(
        &self,
        change_set: ChangeSet,
        impacts: &HashMap<String, ImpactLevel>,
        dep_graph: &DependencyGraph,
    ) -> IncrementalPlan {
        let mut affected: BTreeSet<String> = BTreeSet::new();
        let mut expansion_seeds: Vec<String> = Vec::new();

        for path in change_set.all_changed() {
            match impacts.get(&path).copied() {
                Some(ImpactLevel::NoImpact) => {}
                Some(ImpactLevel::IrLocal) => {
                    affected.insert(path);
                }
                Some(ImpactLevel::SignatureChange) | Some(ImpactLevel::StructuralChange) => {
                    affected.insert(path.clone());
                    expansion_seeds.push(path);
                }
                // Unknown history (added files, renames): conservative
                None => {
                    affected.insert(path.clone());
                    expansion_seeds.push(path);
                }
            }
        }
        // Deleted files invalidate their dependents too
        for path in &change_set.deleted {
            expansion_seeds.push(path.clone());
        }

        let mut mode = self.config.mode;
        let mut escalated = false;
        loop {
            let expansion = dep_graph.affected_from(&expansion_seeds, mode.depth_bound());
            let mut result = affected.clone();
            result.extend(
                expansion
                    .files
                    .into_iter()
                    .filter(|f| !change_set.deleted.contains(f)),
            );

            if expansion.truncated
                && expansion.frontier > self.config.escalation_threshold
                && mode != IncrementalMode::Deep
            {
                mode = mode.escalated();
                escalated = true;
                continue;
            }

            return IncrementalPlan {
                change_set,
                affected: result,
                mode_used: mode,
                escalated,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::cache::Fingerprint;

    fn graph() -> DependencyGraph {
        // c imports b imports a
        let mut g = DependencyGraph::new();
        g.register_file("a.py", Fingerprint::compute(b"a"), &[]);
        g.register_file("b.py", Fingerprint::compute(b"b"), &["a.py".into()]);
        g.register_file("c.py", Fingerprint::compute(b"c"), &["b.py".into()]);
        g
    }

    fn controller(mode: IncrementalMode) -> IncrementalController {
        IncrementalController::new(IncrementalConfig {
            mode,
            escalation_threshold: 256,
        })
    }

    #[test]
    fn test_ir_local_stays_confined() {
        let mut cs = ChangeSet::new();
        cs.add_modified("a.py");

        let impacts = HashMap::from([("a.py".to_string(), ImpactLevel::IrLocal)]);
        let plan = controller(IncrementalMode::Balanced).plan(cs, &impacts, &graph());

        assert_eq!(plan.affected.len(), 1);
        assert!(plan.affected.contains("a.py"));
    }

    #[test]
    fn test_no_impact_rebuilds_nothing() {
        let mut cs = ChangeSet::new();
        cs.add_modified("a.py");

        let impacts = HashMap::from([("a.py".to_string(), ImpactLevel::NoImpact)]);
        let plan = controller(IncrementalMode::Balanced).plan(cs, &impacts, &graph());

        assert!(plan.affected.is_empty());
    }

    #[test]
    fn test_signature_change_invalidates_callers() {
        let mut cs = ChangeSet::new();
        cs.add_modified("a.py");

        let impacts = HashMap::from([("a.py".to_string(), ImpactLevel::SignatureChange)]);
        let plan = controller(IncrementalMode::Deep).plan(cs, &impacts, &graph());

        assert!(plan.affected.contains("a.py"));
        assert!(plan.affected.contains("b.py"));
        assert!(plan.affected.contains("c.py"));
    }

    #[test]
    fn test_fast_mode_bounds_depth() {
        let mut cs = ChangeSet::new();
        cs.add_modified("a.py");

        let impacts = HashMap::from([("a.py".to_string(), ImpactLevel::StructuralChange)]);
        let plan = controller(IncrementalMode::Fast).plan(cs, &impacts, &graph());

        // depth 1: a and b, not c (frontier below threshold, no escalation)
        assert!(plan.affected.contains("b.py"));
        assert!(!plan.affected.contains("c.py"));
        assert!(!plan.escalated);
    }

    #[test]
    fn test_escalation_on_large_frontier() {
        let mut g = DependencyGraph::new();
        g.register_file("core.py", Fingerprint::compute(b"core"), &[]);
        for i in 0..8 {
            let mid = format!("mid{}.py", i);
            g.register_file(&mid, Fingerprint::compute(mid.as_bytes()), &["core.py".into()]);
            for j in 0..4 {
                let leaf = format!("leaf{}_{}.py", i, j);
                g.register_file(&leaf, Fingerprint::compute(leaf.as_bytes()), &[mid.clone()]);
            }
        }

        let mut cs = ChangeSet::new();
        cs.add_modified("core.py");
        let impacts = HashMap::from([("core.py".to_string(), ImpactLevel::StructuralChange)]);

        let controller = IncrementalController::new(IncrementalConfig {
            mode: IncrementalMode::Fast,
            escalation_threshold: 4,
        });
        let plan = controller.plan(cs, &impacts, &g);

        assert!(plan.escalated);
        assert!(plan.affected.len() > 9);
    }
}
