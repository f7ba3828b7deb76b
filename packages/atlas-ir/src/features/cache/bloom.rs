//! Bloom filter wrapper for cache existence checks

use probabilistic_collections::bloom::BloomFilter as ProbBloomFilter;
use std::hash::Hash;

/// Bloom filter for O(1) existence checks
///
/// False positives possible (~1%), false negatives impossible.
pub struct BloomFilter<T> {
    filter: ProbBloomFilter<T>,
    capacity: usize,
    false_positive_rate: f64,
}

impl<T: Hash> BloomFilter<T> {
    pub fn new(capacity: usize, false_positive_rate: f64) -> Self {
        Self {
            filter: ProbBloomFilter::new(capacity, false_positive_rate),
            capacity,
            false_positive_rate,
        }
    }

    pub fn insert(&mut self, item: &T) {
        self.filter.insert(item);
    }

    pub fn contains(&self, item: &T) -> bool {
        self.filter.contains(item)
    }

    pub fn clear(&mut self) {
        self.filter = ProbBloomFilter::new(self.capacity, self.false_positive_rate);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Hash> Default for BloomFilter<T> {
    fn default() -> Self {
        Self::new(10_000, 0.01)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bloom_filter_basic() {
        let mut filter = BloomFilter::new(100, 0.01);
        filter.insert(&"key1");
        filter.insert(&"key2");

        assert!(filter.contains(&"key1"));
        assert!(filter.contains(&"key2"));
        assert!(!filter.contains(&"key3"));
    }

    #[test]
    fn test_bloom_filter_clear() {
        let mut filter = BloomFilter::new(100, 0.01);
        filter.insert(&"key1");
        assert!(filter.contains(&"key1"));

        filter.clear();
        assert!(!filter.contains(&"key1"));
    }
}
