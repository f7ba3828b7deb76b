//! Points-to infrastructure

pub mod andersen;
pub mod sparse_bitmap;

pub use andersen::AndersenSolver;
pub use sparse_bitmap::SparseBitmap;
