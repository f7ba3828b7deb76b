//! Incremental controller (C9)

pub mod change_set;
pub mod controller;
pub mod impact;
pub mod manifest;
pub mod overlay;
pub mod rename_detector;

pub use change_set::ChangeSet;
pub use controller::{IncrementalController, IncrementalPlan};
pub use impact::{ImpactClassifier, ImpactLevel};
pub use manifest::{FileManifest, ManifestEntry};
pub use overlay::{GraphDelta, OverlayView, SpeculativePatch};
pub use rename_detector::{FileFacts, RenameDetector};
