//! Inclusion constraints

use super::abstract_location::LocationId;
use serde::{Deserialize, Serialize};

pub type VarId = u32;

/// Andersen-style subset constraints.
///
/// `p = &a` → a ∈ pts(p); `p = q` → pts(q) ⊆ pts(p);
/// loads and stores are field-sensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// lhs points at the location directly
    AddressOf { lhs: VarId, location: LocationId },
    /// pts(rhs) ⊆ pts(lhs)
    Copy { lhs: VarId, rhs: VarId },
    /// lhs = base.field
    Load {
        lhs: VarId,
        base: VarId,
        field: String,
    },
    /// base.field = rhs
    Store {
        base: VarId,
        field: String,
        rhs: VarId,
    },
}
