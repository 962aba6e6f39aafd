//! Proximal Policy Optimization (PPO)
//!
//! PPO is an on-policy algorithm that keeps each policy update close to the policy that collected
//! the data by clipping the probability ratio π_θ(a|s) / π_old(a|s).
//!
//! # Algorithm Overview
//!
//! 1. Collect `n_steps` transitions with the current policy, across episode boundaries
//! 2. Compute advantages with GAE(γ, λ) and normalize them
//! 3. Run `n_epochs` passes over shuffled minibatches of `batch_size`:
//!    - actor: clipped surrogate `-min(r·A, clip(r, 1-ε, 1+ε)·A)` minus an entropy bonus
//!    - critic: squared error to the returns, optionally clipped around the old values
//! 4. Stop the epochs early once the mean approximate KL of an epoch exceeds `1.5 · target_kl`
//!
//! # Usage Example
//!
//! ```rust,ignore
//! let actor = MLPConfig::new(4, vec![64, 64], 2).init::<Backend>(&DEVICE);
//! let critic = MLPConfig::new(4, vec![64, 64], 1).init::<Backend>(&DEVICE);
//! let config = PPOAgentConfig {
//!     n_steps: 1024,
//!     target_kl: Some(0.02),
//!     ..Default::default()
//! };
//! let mut agent = PPOAgent::<_, _, _, CartPole, 2>::new(actor, critic, config, &*DEVICE);
//!
//! env.reset();
//! for _ in 0..100_000 {
//!     let info = agent.step(&mut env);
//!     if let Some(metrics) = info.metrics {
//!         println!("kl = {:?}, clip = {:?}", metrics.approx_kl, metrics.clip_fraction);
//!     }
//!     if info.done {
//!         env.reset();
//!     }
//! }
//! ```
//!
//! # Hyperparameter Tuning
//! - **Clip ε**: 0.1-0.3
//! - **n_steps**: 128-2048, **n_epochs**: 3-10, **batch_size**: 32-256
//! - **target_kl**: 0.01-0.05 when early stopping is wanted
//!
//! Reference: "Proximal Policy Optimization Algorithms" (Schulman et al., 2017)

use std::{collections::HashMap, path::Path};

use burn::{
    optim::{adaptor::OptimizerAdaptor, AdamW, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use tracing::debug;

use super::{
    adamw, advantage,
    policy::{self, ActorModel, CriticModel, Rollout},
};
use crate::{
    checkpoint,
    env::{Environment, Report},
    error::Result,
    traits::{float_tensor, index_tensor, StepInfo, ToTensor, TrainableAgent, TrainingMetrics},
};

/// Configuration for PPO agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PPOAgentConfig {
    /// Discount factor γ (default: 0.99)
    pub gamma: f32,
    /// GAE lambda λ for advantage estimation (default: 0.95)
    pub gae_lambda: f32,
    /// Clipping parameter ε (default: 0.2)
    pub clip_epsilon: f32,
    /// Actor learning rate (default: 3e-4)
    pub lr_actor: f64,
    /// Critic learning rate (default: 3e-4)
    pub lr_critic: f64,
    /// Entropy coefficient for exploration (default: 0.01)
    pub entropy_coef: f32,
    /// Value loss coefficient (default: 0.5)
    pub value_coef: f32,
    /// Number of steps to collect before update (default: 2048)
    pub n_steps: usize,
    /// Number of optimization epochs per update (default: 10)
    pub n_epochs: usize,
    /// Mini-batch size for updates (default: 64)
    pub batch_size: usize,
    /// Gradient clipping value (default: Some(0.5))
    pub gradient_clip: Option<f32>,
    /// KL divergence threshold for early stopping (default: None)
    pub target_kl: Option<f32>,
    /// Clip value function loss (default: false)
    pub clip_value_loss: bool,
    /// Seed for action sampling and minibatch shuffling, entropy if unset
    pub seed: Option<u64>,
}

impl Default for PPOAgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_epsilon: 0.2,
            lr_actor: 3e-4,
            lr_critic: 3e-4,
            entropy_coef: 0.01,
            value_coef: 0.5,
            n_steps: 2048,
            n_epochs: 10,
            batch_size: 64,
            gradient_clip: Some(0.5),
            target_kl: None,
            clip_value_loss: false,
            seed: None,
        }
    }
}

/// Minibatch statistics accumulated over an update
#[derive(Default)]
struct Totals {
    policy_loss: f32,
    value_loss: f32,
    entropy: f32,
    approx_kl: f32,
    clip_fraction: f32,
    n_updates: usize,
}

impl Totals {
    fn mean(&self, total: f32) -> f32 {
        if self.n_updates > 0 {
            total / self.n_updates as f32
        } else {
            0.0
        }
    }
}

/// PPO Agent for discrete action spaces
///
/// This agent is generic over:
/// - `B`: Autodiff backend (e.g., NdArray, Wgpu)
/// - `Actor`: Actor network implementing [`ActorModel`]
/// - `Critic`: Critic network implementing [`CriticModel`]
/// - `E`: Environment with discrete action space
/// - `D`: Dimension of the batched state tensor
pub struct PPOAgent<B, Actor, Critic, E, const D: usize>
where
    B: AutodiffBackend,
    E: Environment,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
{
    actor: Actor,
    critic: Critic,
    optimizer_actor: OptimizerAdaptor<AdamW, Actor, B>,
    optimizer_critic: OptimizerAdaptor<AdamW, Critic, B>,

    rollout: Rollout<E::State>,
    device: &'static B::Device,
    rng: StdRng,

    // Hyperparameters
    gamma: f32,
    gae_lambda: f32,
    clip_epsilon: f32,
    lr_actor: f64,
    lr_critic: f64,
    entropy_coef: f32,
    value_coef: f32,
    n_steps: usize,
    n_epochs: usize,
    batch_size: usize,
    target_kl: Option<f32>,
    clip_value_loss: bool,

    // Training state
    total_steps: usize,
    learn_mode: bool,
}

impl<B, Actor, Critic, E, const D: usize> PPOAgent<B, Actor, Critic, E, D>
where
    B: AutodiffBackend,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
    E: Environment,
    E::Action: From<usize>,
    Vec<E::State>: ToTensor<B, D, Float>,
{
    /// Create a new PPO agent
    pub fn new(actor: Actor, critic: Critic, config: PPOAgentConfig, device: &'static B::Device) -> Self {
        let rng = config
            .seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);

        Self {
            actor,
            critic,
            optimizer_actor: adamw(config.gradient_clip),
            optimizer_critic: adamw(config.gradient_clip),
            rollout: Rollout::with_capacity(config.n_steps),
            device,
            rng,
            gamma: config.gamma,
            gae_lambda: config.gae_lambda,
            clip_epsilon: config.clip_epsilon,
            lr_actor: config.lr_actor,
            lr_critic: config.lr_critic,
            entropy_coef: config.entropy_coef,
            value_coef: config.value_coef,
            n_steps: config.n_steps.max(1),
            n_epochs: config.n_epochs,
            batch_size: config.batch_size.max(1),
            target_kl: config.target_kl,
            clip_value_loss: config.clip_value_loss,
            total_steps: 0,
            learn_mode: true,
        }
    }

    /// Sample an action for `state`
    pub fn select_action(&mut self, state: &E::State) -> policy::ActionSample {
        let state_tensor = vec![state.clone()].to_tensor(self.device);
        policy::sample_action(&self.actor, &self.critic, state_tensor, &mut self.rng)
    }

    /// Run one episode (training or evaluating depending on the mode)
    pub fn go(&mut self, env: &mut E) -> Report {
        env.reset();

        let mut report = Report::new(vec!["reward", "steps"]);
        while env.is_active() {
            let info = self.step(env);
            report.entry("reward").and_modify(|x| *x += info.reward as f64);
            report.entry("steps").and_modify(|x| *x += 1.0);
            if info.done {
                break;
            }
        }
        report
    }

    fn value_of(&self, state: &E::State) -> f32 {
        let state_tensor = vec![state.clone()].to_tensor(self.device);
        self.critic.forward(state_tensor).detach().into_scalar().elem::<f32>()
    }

    fn learn_internal(&mut self, next_state: Option<&E::State>) -> TrainingMetrics {
        if self.rollout.is_empty() {
            return TrainingMetrics::default();
        }

        let bootstrap = next_state.map(|s| self.value_of(s)).unwrap_or(0.0);
        let (mut advantages, returns) = advantage::gae(
            &self.rollout.rewards,
            &self.rollout.values,
            &self.rollout.dones,
            bootstrap,
            self.gamma,
            self.gae_lambda,
        );
        advantage::normalize(&mut advantages);

        let n_samples = self.rollout.len();
        let mut indices = (0..n_samples).collect::<Vec<_>>();
        let mut totals = Totals::default();
        let mut early_stopped = false;
        let mut epochs = 0;

        for _ in 0..self.n_epochs {
            indices.shuffle(&mut self.rng);
            let mut epoch_kl = 0.0;
            let mut epoch_batches = 0;

            for batch_indices in indices.chunks(self.batch_size) {
                let kl = self.update_minibatch(batch_indices, &advantages, &returns, &mut totals);
                epoch_kl += kl;
                epoch_batches += 1;
            }
            epochs += 1;

            if let Some(target_kl) = self.target_kl {
                let mean_kl = epoch_kl / epoch_batches as f32;
                if mean_kl > 1.5 * target_kl {
                    debug!(epoch = epochs, mean_kl, target_kl, "PPO early stop");
                    early_stopped = true;
                    break;
                }
            }
        }

        self.rollout.clear();

        let metrics = TrainingMetrics {
            policy_loss: totals.mean(totals.policy_loss),
            value_loss: totals.mean(totals.value_loss),
            entropy: totals.mean(totals.entropy),
            approx_kl: Some(totals.mean(totals.approx_kl)),
            clip_fraction: Some(totals.mean(totals.clip_fraction)),
            n_updates: totals.n_updates,
            early_stopped,
            extra: HashMap::from([("epochs".to_string(), epochs as f32)]),
        };
        debug!(
            n_samples,
            policy_loss = metrics.policy_loss,
            value_loss = metrics.value_loss,
            approx_kl = ?metrics.approx_kl,
            "PPO update"
        );
        metrics
    }

    /// One actor and one critic step on the transitions at `batch_indices`, returning the
    /// approximate KL of the minibatch
    fn update_minibatch(
        &mut self,
        batch_indices: &[usize],
        advantages: &[f32],
        returns: &[f32],
        totals: &mut Totals,
    ) -> f32 {
        let rollout = &self.rollout;
        let pick = |values: &[f32]| batch_indices.iter().map(|&i| values[i]).collect::<Vec<_>>();

        let states = batch_indices
            .iter()
            .map(|&i| rollout.states[i].clone())
            .collect::<Vec<_>>()
            .to_tensor(self.device);
        let actions = batch_indices.iter().map(|&i| rollout.actions[i]).collect::<Vec<_>>();
        let actions = index_tensor::<B>(&actions, self.device);
        let old_log_probs = float_tensor::<B>(&pick(&rollout.log_probs), self.device);
        let old_values = float_tensor::<B>(&pick(&rollout.values), self.device);
        let advantages = float_tensor::<B>(&pick(advantages), self.device);
        let returns = float_tensor::<B>(&pick(returns), self.device);

        // Actor
        let logits = self.actor.forward(states.clone());
        let log_probs = policy::action_log_probs(logits.clone(), actions);
        let entropy = policy::mean_entropy(logits);

        let log_ratio = log_probs - old_log_probs;
        let ratio = log_ratio.clone().exp();
        let clipped_ratio = ratio.clone().clamp(1.0 - self.clip_epsilon, 1.0 + self.clip_epsilon);
        let surr1 = ratio.clone() * advantages.clone();
        let surr2 = clipped_ratio * advantages;
        let policy_loss = surr1.min_pair(surr2).mean().neg();
        let actor_loss = policy_loss.clone() - entropy.clone() * self.entropy_coef;

        let approx_kl = log_ratio.detach().neg().mean().into_scalar().elem::<f32>();
        let clip_fraction = (ratio.detach() - 1.0)
            .abs()
            .greater_elem(self.clip_epsilon)
            .float()
            .mean()
            .into_scalar()
            .elem::<f32>();

        totals.policy_loss += policy_loss.into_scalar().elem::<f32>();
        totals.entropy += entropy.into_scalar().elem::<f32>();
        totals.approx_kl += approx_kl;
        totals.clip_fraction += clip_fraction;

        let grads = GradientsParams::from_grads(actor_loss.backward(), &self.actor);
        self.actor = self.optimizer_actor.step(self.lr_actor, self.actor.clone(), grads);

        // Critic
        let values = self.critic.forward(states).squeeze_dims(&[1]);
        let critic_loss = if self.clip_value_loss {
            let values_clipped = old_values.clone()
                + (values.clone() - old_values).clamp(-self.clip_epsilon, self.clip_epsilon);
            let loss1 = (returns.clone() - values).powf_scalar(2.0);
            let loss2 = (returns - values_clipped).powf_scalar(2.0);
            loss1.max_pair(loss2).mean() * self.value_coef
        } else {
            (returns - values).powf_scalar(2.0).mean() * self.value_coef
        };
        totals.value_loss += critic_loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(critic_loss.backward(), &self.critic);
        self.critic = self.optimizer_critic.step(self.lr_critic, self.critic.clone(), grads);

        totals.n_updates += 1;
        approx_kl
    }
}

impl<B, Actor, Critic, E, const D: usize> TrainableAgent<E> for PPOAgent<B, Actor, Critic, E, D>
where
    B: AutodiffBackend,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
    E: Environment,
    E::Action: From<usize>,
    Vec<E::State>: ToTensor<B, D, Float>,
{
    /// Take one step in the environment, updating once `n_steps` transitions are collected
    fn step(&mut self, env: &mut E) -> StepInfo {
        let state = env.current_state();
        let sample = self.select_action(&state);

        let (next_state, reward) = env.step(sample.index.into());
        let done = next_state.is_none();
        self.total_steps += 1;

        if !self.learn_mode {
            return StepInfo { reward, done, metrics: None };
        }

        self.rollout.push(state, sample, reward, done);

        let metrics = self.should_learn().then(|| self.learn(next_state.as_ref()));
        StepInfo { reward, done, metrics }
    }

    fn should_learn(&self) -> bool {
        self.learn_mode && self.rollout.len() >= self.n_steps
    }

    fn learn(&mut self, next_state: Option<&E::State>) -> TrainingMetrics {
        self.learn_internal(next_state)
    }

    fn reset_episode(&mut self) {
        self.rollout.clear();
    }

    fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn eval(&mut self) {
        self.learn_mode = false;
    }

    fn train(&mut self) {
        self.learn_mode = true;
    }

    fn save(&self, dir: &Path) -> Result<()> {
        checkpoint::save_module(&self.actor, dir, "ppo_actor")?;
        checkpoint::save_module(&self.critic, dir, "ppo_critic")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gym::CartPole,
        nn::{MLPConfig, MLP},
    };
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };
    use once_cell::sync::Lazy;

    type TestBackend = Autodiff<NdArray>;
    static DEVICE: Lazy<NdArrayDevice> = Lazy::new(NdArrayDevice::default);

    fn agent(config: PPOAgentConfig) -> PPOAgent<TestBackend, MLP<TestBackend>, MLP<TestBackend>, CartPole, 2> {
        let actor = MLPConfig::new(4, vec![16], 2).init(&*DEVICE);
        let critic = MLPConfig::new(4, vec![16], 1).init(&*DEVICE);
        PPOAgent::new(actor, critic, config, &*DEVICE)
    }

    fn collect(agent: &mut PPOAgent<TestBackend, MLP<TestBackend>, MLP<TestBackend>, CartPole, 2>, steps: usize) -> Vec<TrainingMetrics> {
        let mut env = CartPole::new(500, 4);
        env.reset();
        let mut updates = Vec::new();
        for _ in 0..steps {
            let info = agent.step(&mut env);
            updates.extend(info.metrics);
            if info.done {
                env.reset();
            }
        }
        updates
    }

    #[test]
    fn test_update_after_n_steps() {
        let mut agent = agent(PPOAgentConfig {
            n_steps: 32,
            n_epochs: 2,
            batch_size: 8,
            seed: Some(0),
            ..Default::default()
        });

        let updates = collect(&mut agent, 64);

        assert_eq!(updates.len(), 2);
        for metrics in &updates {
            // 2 epochs of 4 minibatches
            assert_eq!(metrics.n_updates, 8);
            assert!(!metrics.early_stopped);
            assert!(metrics.approx_kl.unwrap().is_finite());
            let clip_fraction = metrics.clip_fraction.unwrap();
            assert!((0.0..=1.0).contains(&clip_fraction));
        }
    }

    #[test]
    fn test_kl_early_stop() {
        let mut agent = agent(PPOAgentConfig {
            n_steps: 32,
            n_epochs: 10,
            batch_size: 8,
            target_kl: Some(-1.0),
            seed: Some(1),
            ..Default::default()
        });

        let updates = collect(&mut agent, 32);

        // A negative target is exceeded by any KL estimate, so only the first epoch runs
        assert_eq!(updates.len(), 1);
        assert!(updates[0].early_stopped);
        assert_eq!(updates[0].n_updates, 4);
    }

    #[test]
    fn test_clipped_value_loss_runs() {
        let mut agent = agent(PPOAgentConfig {
            n_steps: 16,
            n_epochs: 1,
            batch_size: 16,
            clip_value_loss: true,
            seed: Some(2),
            ..Default::default()
        });

        let updates = collect(&mut agent, 16);
        assert_eq!(updates.len(), 1);
        assert!(updates[0].value_loss.is_finite());
    }
}
