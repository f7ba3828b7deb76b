//! SSA domain model

use serde::{Deserialize, Serialize};

/// One SSA version of a variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SsaVariable {
    pub name: String,
    pub version: u32,
    pub def_block: u32,
}

impl SsaVariable {
    pub fn ssa_name(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

/// Phi node at a join point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhiNode {
    pub block: u32,
    pub var: String,
    /// Version this phi defines
    pub version: u32,
    /// (predecessor block, incoming version)
    pub args: Vec<(u32, u32)>,
}

/// Versioned def/use sets of one arena statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StmtVersions {
    pub stmt: u32,
    pub block: u32,
    pub defs: Vec<(String, u32)>,
    pub uses: Vec<(String, u32)>,
}

/// SSA form of one function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SsaGraph {
    pub function_id: String,
    pub variables: Vec<SsaVariable>,
    pub phis: Vec<PhiNode>,
    pub stmt_versions: Vec<StmtVersions>,
}

impl SsaGraph {
    pub fn versions_of(&self, name: &str) -> impl Iterator<Item = &SsaVariable> + '_ {
        let name = name.to_string();
        self.variables.iter().filter(move |v| v.name == name)
    }

    pub fn phis_in(&self, block: u32) -> impl Iterator<Item = &PhiNode> + '_ {
        self.phis.iter().filter(move |p| p.block == block)
    }

    /// Drop versions: per-statement (defs, uses) as plain names.
    ///
    /// Re-running data-flow over the dissolved form must reproduce the
    /// original def-use relation.
    pub fn dissolve(&self) -> Vec<(u32, Vec<String>, Vec<String>)> {
        self.stmt_versions
            .iter()
            .map(|sv| {
                (
                    sv.stmt,
                    sv.defs.iter().map(|(n, _)| n.clone()).collect(),
                    sv.uses.iter().map(|(n, _)| n.clone()).collect(),
                )
            })
            .collect()
    }
}
