//! Chunk kinds

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    Repo,
    Project,
    Module,
    File,
    Class,
    Function,
    Docstring,
    Header,
    Skeleton,
    Usage,
    Constant,
    Variable,
}

impl ChunkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Repo => "repo",
            ChunkKind::Project => "project",
            ChunkKind::Module => "module",
            ChunkKind::File => "file",
            ChunkKind::Class => "class",
            ChunkKind::Function => "function",
            ChunkKind::Docstring => "docstring",
            ChunkKind::Header => "header",
            ChunkKind::Skeleton => "skeleton",
            ChunkKind::Usage => "usage",
            ChunkKind::Constant => "constant",
            ChunkKind::Variable => "variable",
        }
    }

    /// Container levels carry no code text of their own
    pub fn is_container(&self) -> bool {
        matches!(self, ChunkKind::Repo | ChunkKind::Project | ChunkKind::Module)
    }
}
