//! Impact classification
//!
//! Decides how far an edit propagates from the hashes already carried
//! by IR documents: AST shape (comments/formatting independent),
//! signatures, and import targets.

use crate::features::ir_build::domain::IRDocument;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImpactLevel {
    /// Comments/formatting only; nothing to re-analyze
    NoImpact,
    /// Body changed, signatures unchanged; re-analyze this file only
    IrLocal,
    /// A signature changed; callers need invalidation
    SignatureChange,
    /// Imports/exports changed; importers need invalidation
    StructuralChange,
}

impl ImpactLevel {
    /// Whether the dependency graph must be walked
    pub fn propagates(&self) -> bool {
        matches!(self, ImpactLevel::SignatureChange | ImpactLevel::StructuralChange)
    }
}

pub struct ImpactClassifier;

impl ImpactClassifier {
    pub fn classify(old: &IRDocument, new: &IRDocument) -> ImpactLevel {
        if old.ast_hash == new.ast_hash && old.signature_hash == new.signature_hash {
            return ImpactLevel::NoImpact;
        }
        if old.import_hash != new.import_hash {
            return ImpactLevel::StructuralChange;
        }
        if old.signature_hash != new.signature_hash {
            return ImpactLevel::SignatureChange;
        }
        ImpactLevel::IrLocal
    }
}
