//! Trainable agent trait for step-by-step training control
//!
//! Every agent in [`crate::algo`] implements [`TrainableAgent`], which is what lets the
//! [`runner`](crate::runner) drive any of them for a fixed number of environment steps.

use std::{collections::HashMap, path::Path};

use crate::{env::Environment, error::Result};

/// Training metrics returned after each training update
#[derive(Clone, Debug, Default)]
pub struct TrainingMetrics {
    /// Policy/actor loss (surrogate objective for TRPO)
    pub policy_loss: f32,

    /// Value/critic loss, or the TD loss for DQN
    pub value_loss: f32,

    /// Entropy of the policy (higher means more exploration)
    pub entropy: f32,

    /// Approximate KL divergence from the old policy (PPO, TRPO)
    pub approx_kl: Option<f32>,

    /// Fraction of probability ratios that were clipped (PPO)
    pub clip_fraction: Option<f32>,

    /// Number of gradient updates performed
    pub n_updates: usize,

    /// Whether the update stopped early (PPO KL threshold, failed TRPO line search)
    pub early_stopped: bool,

    /// Additional algorithm-specific metrics
    pub extra: HashMap<String, f32>,
}

/// What happened during one call to [`TrainableAgent::step`]
#[derive(Clone, Debug)]
pub struct StepInfo {
    /// Reward received for the step
    pub reward: f32,
    /// Whether the step ended the episode
    pub done: bool,
    /// Metrics of the update triggered by this step, if any
    pub metrics: Option<TrainingMetrics>,
}

/// Trait for trainable RL agents
///
/// # Example
///
/// ```ignore
/// env.reset();
/// loop {
///     let info = agent.step(&mut env);
///     if let Some(metrics) = info.metrics {
///         tracing::debug!(loss = metrics.value_loss);
///     }
///     if info.done {
///         env.reset();
///     }
/// }
/// ```
pub trait TrainableAgent<E: Environment> {
    /// Act once in `env`, store the transition and learn when an update is due
    ///
    /// The caller resets `env` once the returned step is `done`.
    fn step(&mut self, env: &mut E) -> StepInfo;

    /// Whether enough experience has been collected for an update
    ///
    /// Always false in evaluation mode.
    fn should_learn(&self) -> bool;

    /// Update the agent on the experience collected so far
    ///
    /// `next_state` is the state following the last stored transition, `None` if that transition
    /// ended the episode. Off-policy agents ignore it.
    fn learn(&mut self, next_state: Option<&E::State>) -> TrainingMetrics;

    /// Discard collected but unused experience, keeping learned weights
    fn reset_episode(&mut self);

    /// Total number of environment steps taken
    fn total_steps(&self) -> usize;

    /// Switch to evaluation mode: act without storing experience or learning
    fn eval(&mut self);

    /// Switch back to training mode
    fn train(&mut self);

    /// Write the agent's networks into `dir`
    fn save(&self, dir: &Path) -> Result<()>;
}
