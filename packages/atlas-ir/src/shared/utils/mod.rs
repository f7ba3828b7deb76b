//! Shared utilities

pub mod bitset;

pub use bitset::DenseBitSet;
