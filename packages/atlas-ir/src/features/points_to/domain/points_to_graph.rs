//! Points-to graph: variable → set of allocation sites

use super::abstract_location::{AbstractLocation, LocationId};
use super::constraint::VarId;
use crate::features::points_to::infrastructure::sparse_bitmap::SparseBitmap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_variables: usize,
    pub total_locations: usize,
    pub total_edges: usize,
    pub scc_count: usize,
}

/// Points-to relation after the solve.
///
/// Variables inside a collapsed cycle share their representative's set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointsToGraph {
    points_to: FxHashMap<VarId, SparseBitmap>,
    locations: FxHashMap<LocationId, AbstractLocation>,
    /// Variable names → ids (interner snapshot for queries by name)
    var_ids: FxHashMap<String, VarId>,
    /// Cycle representative per collapsed variable
    scc_map: FxHashMap<VarId, VarId>,
    pub stats: GraphStats,
}

impl PointsToGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_location(&mut self, location: AbstractLocation) {
        self.locations.insert(location.id, location);
        self.stats.total_locations = self.locations.len();
    }

    pub fn get_location(&self, id: LocationId) -> Option<&AbstractLocation> {
        self.locations.get(&id)
    }

    pub fn set_var_id(&mut self, name: String, id: VarId) {
        self.var_ids.insert(name, id);
    }

    pub fn var_id(&self, name: &str) -> Option<VarId> {
        self.var_ids.get(name).copied()
    }

    pub fn set_scc(&mut self, var: VarId, representative: VarId) {
        if var != representative {
            self.scc_map.insert(var, representative);
        }
    }

    pub fn representative(&self, var: VarId) -> VarId {
        self.scc_map.get(&var).copied().unwrap_or(var)
    }

    pub fn set_points_to(&mut self, var: VarId, set: SparseBitmap) {
        self.stats.total_edges += set.len();
        self.points_to.insert(var, set);
        self.stats.total_variables = self.points_to.len();
    }

    /// Locations a variable may point at
    pub fn points_to(&self, var: VarId) -> Option<&SparseBitmap> {
        self.points_to.get(&self.representative(var))
    }

    pub fn points_to_by_name(&self, name: &str) -> Option<&SparseBitmap> {
        self.var_id(name).and_then(|v| self.points_to(v))
    }

    /// Two variables may alias when their points-to sets intersect
    pub fn may_alias(&self, a: VarId, b: VarId) -> bool {
        match (self.points_to(a), self.points_to(b)) {
            (Some(pa), Some(pb)) => pa.intersects(pb),
            _ => false,
        }
    }

    pub fn var_count(&self) -> usize {
        self.stats.total_variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir_build::domain::AllocKind;
    use crate::features::points_to::domain::abstract_location::LocationKind;
    use crate::shared::models::Span;

    #[test]
    fn test_alias_via_intersection() {
        let mut graph = PointsToGraph::new();
        graph.add_location(AbstractLocation {
            id: 0,
            kind: LocationKind::Heap(AllocKind::Dict),
            function_id: "f".into(),
            span: Span::zero(),
        });

        let mut a = SparseBitmap::new();
        a.insert(0);
        graph.set_points_to(1, a);

        let mut b = SparseBitmap::new();
        b.insert(0);
        graph.set_points_to(2, b);

        let mut c = SparseBitmap::new();
        c.insert(7);
        graph.set_points_to(3, c);

        assert!(graph.may_alias(1, 2));
        assert!(!graph.may_alias(1, 3));
    }

    #[test]
    fn test_scc_representative_shares_set() {
        let mut graph = PointsToGraph::new();
        let mut set = SparseBitmap::new();
        set.insert(4);
        graph.set_points_to(1, set);
        graph.set_scc(2, 1);

        assert!(graph.points_to(2).unwrap().contains(4));
    }
}
