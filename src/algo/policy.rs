//! Stochastic policies over discrete actions, shared by A2C, PPO and TRPO
//!
//! The actor maps a batch of states to action logits, the critic maps it to state values. Both are
//! implemented for [`MLP`], which is what the [`runner`](crate::runner) uses.

use burn::{
    module::AutodiffModule,
    prelude::*,
    tensor::{
        activation::{log_softmax, softmax},
        backend::AutodiffBackend,
    },
};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

use crate::nn::MLP;

/// Actor model trait for discrete actions
pub trait ActorModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    /// Forward pass: state -> action logits
    /// States are batched with dimension D, outputs logits with shape (batch, num_actions)
    fn forward(&self, state: Tensor<B, D>) -> Tensor<B, 2>;
}

/// Critic model trait
pub trait CriticModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    /// Forward pass: state -> value
    /// States are batched with dimension D, outputs values with shape (batch, 1)
    fn forward(&self, state: Tensor<B, D>) -> Tensor<B, 2>;
}

/// `[batch, features]` → `[batch, actions]`
impl<B: AutodiffBackend> ActorModel<B, 2> for MLP<B> {
    fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        MLP::forward(self, state)
    }
}

/// `[batch, features]` → `[batch, 1]`
impl<B: AutodiffBackend> CriticModel<B, 2> for MLP<B> {
    fn forward(&self, state: Tensor<B, 2>) -> Tensor<B, 2> {
        MLP::forward(self, state)
    }
}

/// An action drawn from the policy, with what the on-policy updates need to remember about it
#[derive(Clone, Copy, Debug)]
pub struct ActionSample {
    pub index: usize,
    pub log_prob: f32,
    pub value: f32,
}

/// Sample an action for a single state (a batch of one)
///
/// Falls back to the most likely action if the probabilities cannot form a distribution.
pub fn sample_action<B, Actor, Critic, R, const D: usize>(
    actor: &Actor,
    critic: &Critic,
    state: Tensor<B, D>,
    rng: &mut R,
) -> ActionSample
where
    B: AutodiffBackend,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
    R: Rng + ?Sized,
{
    let logits = actor.forward(state.clone()).detach();
    let probs = softmax(logits.clone(), 1).into_data().iter::<f32>().collect::<Vec<_>>();
    let log_probs = log_softmax(logits, 1).into_data().iter::<f32>().collect::<Vec<_>>();
    let value = critic.forward(state).detach().into_scalar().elem::<f32>();

    let index = match WeightedIndex::new(&probs) {
        Ok(dist) => dist.sample(rng),
        Err(_) => argmax(&probs),
    };

    ActionSample {
        index,
        log_prob: log_probs[index],
        value,
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

/// Log-probabilities of the taken actions, `[batch, actions]` logits and `[batch]` indices → `[batch]`
pub fn action_log_probs<B: Backend>(logits: Tensor<B, 2>, actions: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    log_softmax(logits, 1)
        .gather(1, actions.unsqueeze_dim(1))
        .squeeze_dims(&[1])
}

/// Mean entropy of the categorical distributions given by `[batch, actions]` logits
pub fn mean_entropy<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits.clone(), 1);
    let probs = softmax(logits, 1);
    (probs * log_probs).sum_dim(1).neg().mean()
}

/// On-policy experience collected since the last update
#[derive(Clone, Debug)]
pub struct Rollout<S> {
    pub states: Vec<S>,
    pub actions: Vec<usize>,
    pub rewards: Vec<f32>,
    pub log_probs: Vec<f32>,
    pub values: Vec<f32>,
    pub dones: Vec<bool>,
}

impl<S> Default for Rollout<S> {
    fn default() -> Self {
        Self {
            states: Vec::new(),
            actions: Vec::new(),
            rewards: Vec::new(),
            log_probs: Vec::new(),
            values: Vec::new(),
            dones: Vec::new(),
        }
    }
}

impl<S> Rollout<S> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            log_probs: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            dones: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, state: S, sample: ActionSample, reward: f32, done: bool) {
        self.states.push(state);
        self.actions.push(sample.index);
        self.rewards.push(reward);
        self.log_probs.push(sample.log_prob);
        self.values.push(sample.value);
        self.dones.push(done);
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.actions.clear();
        self.rewards.clear();
        self.log_probs.clear();
        self.values.clear();
        self.dones.clear();
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}
