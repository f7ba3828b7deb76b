//! Sparse bitmap keyed by 64-bit chunks
//!
//! Points-to sets are sparse over allocation-site ids; a chunk map
//! keeps memory proportional to occupancy while set union stays a
//! word-wise OR.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseBitmap {
    chunks: FxHashMap<u32, u64>,
}

impl SparseBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn insert(&mut self, idx: u32) -> bool {
        let chunk = self.chunks.entry(idx / 64).or_insert(0);
        let mask = 1u64 << (idx % 64);
        let changed = *chunk & mask == 0;
        *chunk |= mask;
        changed
    }

    #[inline]
    pub fn contains(&self, idx: u32) -> bool {
        self.chunks
            .get(&(idx / 64))
            .map(|chunk| chunk & (1u64 << (idx % 64)) != 0)
            .unwrap_or(false)
    }

    /// Union other into self; returns true when self changed
    pub fn union_with(&mut self, other: &SparseBitmap) -> bool {
        let mut changed = false;
        for (&key, &bits) in &other.chunks {
            let chunk = self.chunks.entry(key).or_insert(0);
            let before = *chunk;
            *chunk |= bits;
            changed |= *chunk != before;
        }
        changed
    }

    pub fn len(&self) -> usize {
        self.chunks.values().map(|c| c.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.values().all(|c| *c == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        let mut keys: Vec<u32> = self.chunks.keys().copied().collect();
        keys.sort_unstable();
        keys.into_iter().flat_map(move |key| {
            let mut bits = self.chunks[&key];
            std::iter::from_fn(move || {
                if bits == 0 {
                    None
                } else {
                    let bit = bits.trailing_zeros();
                    bits &= bits - 1;
                    Some(key * 64 + bit)
                }
            })
        })
    }

    pub fn intersects(&self, other: &SparseBitmap) -> bool {
        for (key, bits) in &self.chunks {
            if let Some(other_bits) = other.chunks.get(key) {
                if bits & other_bits != 0 {
                    return true;
                }
            }
        }
        false
    }
}
