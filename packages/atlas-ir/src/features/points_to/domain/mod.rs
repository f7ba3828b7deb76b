//! Points-to domain models

mod abstract_location;
mod constraint;
mod points_to_graph;

pub use abstract_location::{AbstractLocation, LocationId, LocationKind};
pub use constraint::{Constraint, VarId};
pub use points_to_graph::{GraphStats, PointsToGraph};
