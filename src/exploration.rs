use rand::Rng;

use crate::decay::Decay;

/// The outcome of an exploration decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Explore,
    Exploit,
}

/// ε-greedy exploration with a decaying ε
#[derive(Debug, Clone)]
pub struct EpsilonGreedy<D> {
    decay: D,
}

impl<D: Decay> EpsilonGreedy<D> {
    pub fn new(decay: D) -> Self {
        Self { decay }
    }

    /// Current ε after `step` steps
    pub fn epsilon(&self, step: usize) -> f32 {
        self.decay.evaluate(step).clamp(0.0, 1.0)
    }

    /// Explore with probability ε, exploit otherwise
    pub fn choose<R: Rng + ?Sized>(&self, step: usize, rng: &mut R) -> Choice {
        if rng.gen::<f32>() < self.epsilon(step) {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }
}
