//! Cross-file resolver (C3)

pub mod call_graph;
pub mod global_context;
pub mod infrastructure;
pub mod ports;
pub mod resolver;
pub mod symbol_index;
pub mod types;

pub use call_graph::CallGraph;
pub use global_context::GlobalContext;
pub use infrastructure::MemoryGraphStore;
pub use ports::{GraphStore, GraphTransaction};
pub use resolver::{CrossFileResolver, ResolveOutput};
pub use symbol_index::SymbolIndex;
pub use types::{ImportTable, Symbol};
