//! Type enricher (C5)

pub mod application;
pub mod ports;

pub use application::TypeEnricher;
pub use ports::{Diagnostic, LanguageServerPort, TypeInfo};
