//! Array-backed segment trees
//!
//! A segment tree stores `capacity` leaves in `values[capacity..2 * capacity]` and keeps every
//! internal node `i` equal to `op(values[2i], values[2i + 1])`. Node `1` is the root, node `0` is unused.
//!
//! Setting a leaf costs O(log n), and so does reducing `op` over any contiguous range of leaves.
//! [`SumTree`] additionally supports sampling an index proportionally to its value, which is what
//! [`PrioritizedReplayMemory`](crate::memory::PrioritizedReplayMemory) builds on.

use std::ops::{Deref, DerefMut};

use crate::error::{Result, RlError};

/// A segment tree over `f32` values with an associative, commutative operation
#[derive(Debug, Clone)]
pub struct SegmentTree {
    capacity: usize,
    values: Vec<f32>,
    operation: fn(f32, f32) -> f32,
    neutral: f32,
}

impl SegmentTree {
    /// Create a tree with every leaf set to `neutral`
    ///
    /// ### Arguments
    /// - `capacity` Number of leaves, must be a positive power of two
    /// - `operation` Reduction operation, e.g. `+` or `min`
    /// - `neutral` Neutral element of `operation`, e.g. `0.0` for `+` or `f32::INFINITY` for `min`
    pub fn new(capacity: usize, operation: fn(f32, f32) -> f32, neutral: f32) -> Result<Self> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(RlError::InvalidCapacity(format!(
                "segment tree capacity must be a positive power of two, got {capacity}"
            )));
        }

        Ok(Self {
            capacity,
            values: vec![neutral; 2 * capacity],
            operation,
            neutral,
        })
    }

    /// Number of leaves
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set leaf `idx` and refresh its ancestors
    pub fn set(&mut self, idx: usize, value: f32) {
        assert!(idx < self.capacity, "index {idx} out of bounds for capacity {}", self.capacity);

        let mut node = idx + self.capacity;
        self.values[node] = value;
        node /= 2;
        while node >= 1 {
            self.values[node] = (self.operation)(self.values[2 * node], self.values[2 * node + 1]);
            node /= 2;
        }
    }

    /// Value of leaf `idx`
    pub fn get(&self, idx: usize) -> f32 {
        assert!(idx < self.capacity, "index {idx} out of bounds for capacity {}", self.capacity);
        self.values[self.capacity + idx]
    }

    /// Reduce the operation over the leaves in `[start, end)`
    ///
    /// An empty range yields the neutral element.
    pub fn reduce(&self, start: usize, end: usize) -> f32 {
        assert!(end <= self.capacity, "range end {end} out of bounds for capacity {}", self.capacity);

        let mut result = self.neutral;
        let mut lo = start + self.capacity;
        let mut hi = end + self.capacity;

        while lo < hi {
            if lo % 2 == 1 {
                result = (self.operation)(result, self.values[lo]);
                lo += 1;
            }
            if hi % 2 == 1 {
                hi -= 1;
                result = (self.operation)(result, self.values[hi]);
            }
            lo /= 2;
            hi /= 2;
        }

        result
    }

    /// Reduce the operation over every leaf
    pub fn reduce_all(&self) -> f32 {
        self.values[1]
    }
}

/// A [`SegmentTree`] summing its leaves
#[derive(Debug, Clone)]
pub struct SumTree(SegmentTree);

impl SumTree {
    pub fn new(capacity: usize) -> Result<Self> {
        SegmentTree::new(capacity, |a, b| a + b, 0.0).map(Self)
    }

    /// Sum of all leaves
    pub fn sum(&self) -> f32 {
        self.reduce_all()
    }

    /// Find the highest index `i` such that `leaf[0] + ... + leaf[i - 1] <= prefixsum`
    ///
    /// When the leaves are unnormalized probabilities, feeding a uniform draw from `[0, sum())`
    /// samples index `i` with probability `leaf[i] / sum()`.
    pub fn find_prefixsum_idx(&self, prefixsum: f32) -> usize {
        debug_assert!(
            prefixsum >= 0.0 && prefixsum <= self.sum() + 1e-5,
            "prefix sum {prefixsum} outside [0, {}]",
            self.sum()
        );

        let mut mass = prefixsum;
        let mut node = 1;
        while node < self.0.capacity {
            let left = self.0.values[2 * node];
            if left > mass {
                node *= 2;
            } else {
                mass -= left;
                node = 2 * node + 1;
            }
        }

        node - self.0.capacity
    }
}

impl Deref for SumTree {
    type Target = SegmentTree;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for SumTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A [`SegmentTree`] tracking the minimum of its leaves
#[derive(Debug, Clone)]
pub struct MinTree(SegmentTree);

impl MinTree {
    pub fn new(capacity: usize) -> Result<Self> {
        SegmentTree::new(capacity, f32::min, f32::INFINITY).map(Self)
    }

    /// Minimum over all leaves
    pub fn min(&self) -> f32 {
        self.reduce_all()
    }
}

impl Deref for MinTree {
    type Target = SegmentTree;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MinTree {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
