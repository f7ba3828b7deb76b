//! Heap & points-to analysis (C6)

pub mod domain;
pub mod infrastructure;

pub use domain::{AbstractLocation, Constraint, GraphStats, LocationId, LocationKind, PointsToGraph, VarId};
pub use infrastructure::{AndersenSolver, SparseBitmap};
