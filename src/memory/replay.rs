use rand::Rng;

use super::{Exp, ExpBatch};
use crate::env::Environment;

/// A fixed-capacity ring buffer of transitions with uniform sampling
///
/// Once full, each new transition overwrites the oldest one.
#[derive(Debug, Clone)]
pub struct ReplayMemory<E: Environment> {
    storage: Vec<Exp<E>>,
    capacity: usize,
    next_idx: usize,
    pub batch_size: usize,
}

impl<E: Environment> ReplayMemory<E> {
    /// Create an empty replay memory
    ///
    /// ### Arguments
    /// - `capacity` Maximum number of stored transitions
    /// - `batch_size` Number of transitions drawn by [`ReplayMemory::sample_zipped`]
    pub fn new(capacity: usize, batch_size: usize) -> Self {
        assert!(capacity > 0, "replay memory capacity must be positive");
        Self {
            storage: Vec::with_capacity(capacity),
            capacity,
            next_idx: 0,
            batch_size,
        }
    }

    /// Store a transition, returning the slot it was written to
    pub fn push(&mut self, exp: Exp<E>) -> usize {
        let idx = self.next_idx;
        if idx >= self.storage.len() {
            self.storage.push(exp);
        } else {
            self.storage[idx] = exp;
        }
        self.next_idx = (self.next_idx + 1) % self.capacity;
        idx
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draw `batch_size` transitions uniformly at random, with replacement
    ///
    /// Returns `None` if the memory is empty.
    pub fn sample_zipped<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ExpBatch<E>> {
        if self.storage.is_empty() {
            return None;
        }

        let indices = (0..self.batch_size)
            .map(|_| rng.gen_range(0..self.storage.len()))
            .collect::<Vec<_>>();
        Some(self.gather(&indices))
    }

    /// Build a batch from specific slots
    pub(crate) fn gather(&self, indices: &[usize]) -> ExpBatch<E> {
        let mut batch = ExpBatch::with_capacity(indices.len());
        for &i in indices {
            batch.push(&self.storage[i]);
        }
        batch
    }
}
