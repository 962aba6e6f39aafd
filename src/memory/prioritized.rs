//! Proportional prioritized experience replay
//!
//! Transition `i` is sampled with probability `P(i) = p_i^α / Σ_k p_k^α`, where `p_i` is its priority.
//! The bias this introduces is corrected with importance sampling weights
//! `w_i = (N · P(i))^(-β) / max_j w_j`, with β annealed linearly towards 1 over training.
//!
//! Reference: "Prioritized Experience Replay" (Schaul et al., 2016)

use rand::Rng;

use super::{Exp, ExpBatch, ReplayMemory};
use crate::{
    ds::{MinTree, SumTree},
    env::Environment,
    error::{Result, RlError},
};

/// A [`ReplayMemory`] which samples transitions proportionally to their priority
#[derive(Debug, Clone)]
pub struct PrioritizedReplayMemory<E: Environment> {
    memory: ReplayMemory<E>,
    sum_tree: SumTree,
    min_tree: MinTree,
    max_priority: f32,
    alpha: f32,
    beta_0: f32,
    beta_steps: usize,
    pub batch_size: usize,
}

impl<E: Environment> PrioritizedReplayMemory<E> {
    /// Create an empty prioritized replay memory
    ///
    /// ### Arguments
    /// - `capacity` Maximum number of stored transitions
    /// - `batch_size` Number of transitions per sample
    /// - `alpha` Prioritization exponent, `0` is uniform sampling and `1` full prioritization
    /// - `beta_0` Initial importance sampling exponent
    /// - `beta_steps` Number of steps over which β is annealed from `beta_0` to `1`
    pub fn new(
        capacity: usize,
        batch_size: usize,
        alpha: f32,
        beta_0: f32,
        beta_steps: usize,
    ) -> Result<Self> {
        if alpha < 0.0 {
            return Err(RlError::InvalidArgument(format!(
                "prioritization exponent alpha must be non-negative, got {alpha}"
            )));
        }
        if !(0.0..=1.0).contains(&beta_0) {
            return Err(RlError::InvalidArgument(format!(
                "importance sampling exponent beta_0 must be in [0, 1], got {beta_0}"
            )));
        }

        let tree_capacity = capacity.max(1).next_power_of_two();

        Ok(Self {
            memory: ReplayMemory::new(capacity, batch_size),
            sum_tree: SumTree::new(tree_capacity)?,
            min_tree: MinTree::new(tree_capacity)?,
            max_priority: 1.0,
            alpha,
            beta_0,
            beta_steps,
            batch_size,
        })
    }

    /// Store a transition with the highest priority seen so far
    pub fn push(&mut self, exp: Exp<E>) {
        let idx = self.memory.push(exp);
        let priority = self.max_priority.powf(self.alpha);
        self.sum_tree.set(idx, priority);
        self.min_tree.set(idx, priority);
    }

    pub fn len(&self) -> usize {
        self.memory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.is_empty()
    }

    /// The stored sampling weight `p^α` of slot `idx`
    pub fn priority(&self, idx: usize) -> f32 {
        self.sum_tree.get(idx)
    }

    /// The importance sampling exponent after `step` steps
    pub fn beta(&self, step: usize) -> f32 {
        if self.beta_steps == 0 {
            return 1.0;
        }
        let fraction = (step as f32 / self.beta_steps as f32).min(1.0);
        self.beta_0 + fraction * (1.0 - self.beta_0)
    }

    /// Draw a prioritized batch
    ///
    /// Returns the batch, the importance sampling weights and the sampled slots (to be passed back to
    /// [`PrioritizedReplayMemory::update_priorities`]), or `None` if the memory is empty.
    pub fn sample_zipped<R: Rng + ?Sized>(
        &self,
        step: usize,
        rng: &mut R,
    ) -> Option<(ExpBatch<E>, Vec<f32>, Vec<usize>)> {
        if self.memory.is_empty() {
            return None;
        }

        let indices = self.sample_proportional(rng);

        let n = self.memory.len() as f32;
        let beta = self.beta(step);
        let total = self.sum_tree.sum();
        let p_min = self.min_tree.min() / total;
        let max_weight = (p_min * n).powf(-beta);

        let weights = indices
            .iter()
            .map(|&i| {
                let p_sample = self.sum_tree.get(i) / total;
                (p_sample * n).powf(-beta) / max_weight
            })
            .collect();

        Some((self.memory.gather(&indices), weights, indices))
    }

    /// Stratified sampling: one draw from each of `batch_size` equal slices of the total mass
    fn sample_proportional<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let len = self.memory.len();
        let p_total = self.sum_tree.reduce(0, len);
        let segment = p_total / self.batch_size as f32;

        (0..self.batch_size)
            .map(|i| {
                let mass = rng.gen::<f32>() * segment + i as f32 * segment;
                // float round-off can land on an unused leaf past the end
                self.sum_tree.find_prefixsum_idx(mass).min(len - 1)
            })
            .collect()
    }

    /// Set the priorities of previously sampled slots
    ///
    /// Every priority must be strictly positive.
    pub fn update_priorities(&mut self, indices: &[usize], priorities: &[f32]) -> Result<()> {
        if indices.len() != priorities.len() {
            return Err(RlError::InvalidArgument(format!(
                "got {} indices but {} priorities",
                indices.len(),
                priorities.len()
            )));
        }

        // nothing is written unless every entry is valid
        for (&idx, &priority) in indices.iter().zip(priorities) {
            if priority <= 0.0 || !priority.is_finite() {
                return Err(RlError::InvalidArgument(format!(
                    "priority must be positive and finite, got {priority}"
                )));
            }
            if idx >= self.memory.len() {
                return Err(RlError::InvalidArgument(format!(
                    "index {idx} out of bounds for memory of length {}",
                    self.memory.len()
                )));
            }
        }

        for (&idx, &priority) in indices.iter().zip(priorities) {
            let scaled = priority.powf(self.alpha);
            self.sum_tree.set(idx, scaled);
            self.min_tree.set(idx, scaled);
            self.max_priority = self.max_priority.max(priority);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::gym::CartPole;

    fn exp(reward: f32) -> Exp<CartPole> {
        Exp {
            state: [reward; 4],
            action: 1.into(),
            reward,
            next_state: None,
        }
    }

    #[test]
    fn rejects_invalid_exponents() {
        assert!(PrioritizedReplayMemory::<CartPole>::new(8, 2, -0.1, 0.4, 10).is_err());
        assert!(PrioritizedReplayMemory::<CartPole>::new(8, 2, 0.6, 1.5, 10).is_err());
    }

    #[test]
    fn beta_is_annealed_to_one() {
        let memory = PrioritizedReplayMemory::<CartPole>::new(8, 2, 0.6, 0.4, 100).unwrap();
        assert!((memory.beta(0) - 0.4).abs() < 1e-6);
        assert!((memory.beta(50) - 0.7).abs() < 1e-6);
        assert!((memory.beta(100) - 1.0).abs() < 1e-6);
        assert!((memory.beta(1_000) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn fresh_transitions_have_uniform_weights() {
        let mut memory = PrioritizedReplayMemory::<CartPole>::new(5, 4, 0.6, 0.4, 100).unwrap();
        for r in 0..5 {
            memory.push(exp(r as f32));
        }
        let mut rng = StdRng::seed_from_u64(3);

        let (batch, weights, indices) = memory.sample_zipped(0, &mut rng).unwrap();
        assert_eq!(batch.len(), 4);
        assert_eq!(indices.len(), 4);
        assert!(indices.iter().all(|&i| i < 5));
        assert!(weights.iter().all(|w| (w - 1.0).abs() < 1e-5));
    }

    #[test]
    fn high_priority_dominates_sampling() {
        let mut memory = PrioritizedReplayMemory::<CartPole>::new(4, 64, 1.0, 0.4, 100).unwrap();
        for r in 0..4 {
            memory.push(exp(r as f32));
        }
        memory
            .update_priorities(&[0, 1, 2, 3], &[1e-3, 1e-3, 1e-3, 10.0])
            .unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let (_, weights, indices) = memory.sample_zipped(0, &mut rng).unwrap();
        let hits = indices.iter().filter(|&&i| i == 3).count();
        assert!(hits > 60, "expected slot 3 to dominate, got {hits} hits");

        // the rarely sampled slots carry the largest correction
        let max_weight = weights.iter().cloned().fold(f32::MIN, f32::max);
        assert!(max_weight <= 1.0 + 1e-5);
    }

    #[test]
    fn update_priorities_validates_input() {
        let mut memory = PrioritizedReplayMemory::<CartPole>::new(4, 2, 0.6, 0.4, 100).unwrap();
        memory.push(exp(0.0));

        assert!(memory.update_priorities(&[0], &[0.0]).is_err());
        assert!(memory.update_priorities(&[0], &[f32::NAN]).is_err());
        assert!(memory.update_priorities(&[3], &[1.0]).is_err());
        assert!(memory.update_priorities(&[0, 0], &[1.0]).is_err());
        assert!(memory.update_priorities(&[0], &[2.0]).is_ok());
    }

    #[test]
    fn rejected_update_leaves_priorities_untouched() {
        let mut memory = PrioritizedReplayMemory::<CartPole>::new(4, 2, 1.0, 0.4, 100).unwrap();
        for r in 0..3 {
            memory.push(exp(r as f32));
        }

        // the NaN sits after two valid entries
        let result = memory.update_priorities(&[0, 1, 2], &[4.0, 3.0, f32::NAN]);
        assert!(result.is_err());

        for idx in 0..3 {
            assert!((memory.priority(idx) - 1.0).abs() < 1e-6);
        }
        assert!((memory.max_priority - 1.0).abs() < 1e-6);
    }

    #[test]
    fn new_transitions_use_max_priority() {
        let mut memory = PrioritizedReplayMemory::<CartPole>::new(4, 2, 1.0, 0.4, 100).unwrap();
        memory.push(exp(0.0));
        memory.update_priorities(&[0], &[5.0]).unwrap();
        memory.push(exp(1.0));

        assert!((memory.sum_tree.get(1) - 5.0).abs() < 1e-6);
        assert!((memory.sum_tree.sum() - 10.0).abs() < 1e-5);
    }
}
