//! Abstract heap locations (allocation sites)

use crate::features::ir_build::domain::AllocKind;
use crate::shared::models::Span;
use serde::{Deserialize, Serialize};

pub type LocationId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    Heap(AllocKind),
    Global,
}

/// One allocation site, identified by (function, span)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractLocation {
    pub id: LocationId,
    pub kind: LocationKind,
    pub function_id: String,
    pub span: Span,
}

impl AbstractLocation {
    pub fn site_key(function_id: &str, span: Span) -> String {
        format!(
            "{}:{}:{}",
            function_id, span.start_line, span.start_col
        )
    }
}
