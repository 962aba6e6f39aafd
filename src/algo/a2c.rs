//! Advantage Actor-Critic (A2C)
//!
//! A2C is an on-policy actor-critic algorithm that works with discrete action spaces.
//! It uses the advantage function A(s,a) = R(s,a) - V(s) to reduce variance in policy gradients.
//!
//! # Algorithm Overview
//!
//! - **Actor network**: Outputs action logits, π(a|s) = softmax(logits)
//! - **Critic network**: Estimates state value function V(s)
//!
//! The agent collects `n_steps` transitions (fewer if the episode ends first), computes n-step
//! discounted returns bootstrapped with V of the following state, and takes one gradient step on
//! each network.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use burn::backend::{Autodiff, NdArray};
//! use rlexp::{algo::a2c::{A2CAgent, A2CAgentConfig}, gym::CartPole, nn::MLPConfig};
//!
//! type Backend = Autodiff<NdArray>;
//!
//! let mut env = CartPole::new(500, 0);
//! let actor = MLPConfig::new(4, vec![64, 64], 2).init::<Backend>(&DEVICE);
//! let critic = MLPConfig::new(4, vec![64, 64], 1).init::<Backend>(&DEVICE);
//! let mut agent = A2CAgent::<_, _, _, CartPole, 2>::new(actor, critic, A2CAgentConfig::default(), &DEVICE);
//!
//! for episode in 0..1000 {
//!     let report = agent.go(&mut env);
//!     println!("Episode {}: reward = {:.2}", episode, report.get("reward").unwrap());
//! }
//! ```
//!
//! # Tips
//! - Learning rates around 1e-4 to 1e-3, n-steps between 5 and 20
//! - Entropy coefficient 0.001-0.01 (higher = more exploration)
//! - A2C can be unstable; PPO is usually the safer choice
//!
//! Reference: "Asynchronous Methods for Deep Reinforcement Learning" (Mnih et al., 2016)

use std::{collections::HashMap, path::Path};

use burn::{
    optim::{adaptor::OptimizerAdaptor, AdamW, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
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

/// Configuration for A2C agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct A2CAgentConfig {
    /// Discount factor γ (default: 0.99)
    pub gamma: f32,
    /// Actor learning rate (default: 7e-4)
    pub lr_actor: f64,
    /// Critic learning rate (default: 7e-4)
    pub lr_critic: f64,
    /// Entropy coefficient for exploration (default: 0.01)
    pub entropy_coef: f32,
    /// Value loss coefficient (default: 0.5)
    pub value_coef: f32,
    /// Number of steps to collect before update (default: 5)
    pub n_steps: usize,
    /// Gradient clipping value (default: Some(0.5))
    pub gradient_clip: Option<f32>,
    /// Seed for action sampling, entropy if unset
    pub seed: Option<u64>,
}

impl Default for A2CAgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            lr_actor: 7e-4,
            lr_critic: 7e-4,
            entropy_coef: 0.01,
            value_coef: 0.5,
            n_steps: 5,
            gradient_clip: Some(0.5),
            seed: None,
        }
    }
}

/// A2C Agent for discrete action spaces
///
/// This agent is generic over:
/// - `B`: Autodiff backend (e.g., NdArray, Wgpu)
/// - `Actor`: Actor network implementing [`ActorModel`]
/// - `Critic`: Critic network implementing [`CriticModel`]
/// - `E`: Environment with discrete action space
/// - `STATE_DIM`: Dimension of the batched state tensor
pub struct A2CAgent<B, Actor, Critic, E, const STATE_DIM: usize>
where
    B: AutodiffBackend,
    E: Environment,
    Actor: ActorModel<B, STATE_DIM>,
    Critic: CriticModel<B, STATE_DIM>,
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
    lr_actor: f64,
    lr_critic: f64,
    entropy_coef: f32,
    value_coef: f32,
    n_steps: usize,

    // Training state
    total_steps: usize,
    learn_mode: bool,
}

impl<B, Actor, Critic, E, const STATE_DIM: usize> A2CAgent<B, Actor, Critic, E, STATE_DIM>
where
    B: AutodiffBackend,
    Actor: ActorModel<B, STATE_DIM>,
    Critic: CriticModel<B, STATE_DIM>,
    E: Environment,
    E::Action: From<usize>,
    Vec<E::State>: ToTensor<B, STATE_DIM, Float>,
{
    /// Create a new A2C agent
    pub fn new(actor: Actor, critic: Critic, config: A2CAgentConfig, device: &'static B::Device) -> Self {
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
            lr_actor: config.lr_actor,
            lr_critic: config.lr_critic,
            entropy_coef: config.entropy_coef,
            value_coef: config.value_coef,
            n_steps: config.n_steps.max(1),
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
        loop {
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
        let returns = advantage::discounted_returns(&self.rollout.rewards, &self.rollout.dones, bootstrap, self.gamma);
        let mut advantages = returns
            .iter()
            .zip(&self.rollout.values)
            .map(|(r, v)| r - v)
            .collect::<Vec<_>>();
        advantage::normalize(&mut advantages);

        let states = self.rollout.states.clone().to_tensor(self.device);
        let actions = index_tensor::<B>(&self.rollout.actions, self.device);
        let returns = float_tensor::<B>(&returns, self.device);
        let advantages = float_tensor::<B>(&advantages, self.device);

        // Actor: -A·log π(a|s) - entropy bonus
        let logits = self.actor.forward(states.clone());
        let log_probs = policy::action_log_probs(logits.clone(), actions);
        let entropy = policy::mean_entropy(logits);
        let actor_loss = (advantages * log_probs).neg().mean() - entropy.clone() * self.entropy_coef;

        let policy_loss = actor_loss.clone().into_scalar().elem::<f32>();
        let entropy = entropy.into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(actor_loss.backward(), &self.actor);
        self.actor = self.optimizer_actor.step(self.lr_actor, self.actor.clone(), grads);

        // Critic: value_coef·(R - V)²
        let values = self.critic.forward(states).squeeze_dims(&[1]);
        let critic_loss = (returns - values).powf_scalar(2.0).mean() * self.value_coef;
        let value_loss = critic_loss.clone().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(critic_loss.backward(), &self.critic);
        self.critic = self.optimizer_critic.step(self.lr_critic, self.critic.clone(), grads);

        let batch = self.rollout.len();
        self.rollout.clear();

        debug!(batch, policy_loss, value_loss, entropy, "A2C update");

        TrainingMetrics {
            policy_loss,
            value_loss,
            entropy,
            n_updates: 1,
            extra: HashMap::from([("batch_size".to_string(), batch as f32)]),
            ..Default::default()
        }
    }
}

impl<B, Actor, Critic, E, const STATE_DIM: usize> TrainableAgent<E> for A2CAgent<B, Actor, Critic, E, STATE_DIM>
where
    B: AutodiffBackend,
    Actor: ActorModel<B, STATE_DIM>,
    Critic: CriticModel<B, STATE_DIM>,
    E: Environment,
    E::Action: From<usize>,
    Vec<E::State>: ToTensor<B, STATE_DIM, Float>,
{
    /// Take one step in the environment, updating once the rollout is full or the episode ends
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

        let metrics = (self.should_learn() || done).then(|| self.learn(next_state.as_ref()));
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
        checkpoint::save_module(&self.actor, dir, "a2c_actor")?;
        checkpoint::save_module(&self.critic, dir, "a2c_critic")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gym::CartPole,
        nn::{params, MLPConfig, MLP},
    };
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };
    use once_cell::sync::Lazy;

    type TestBackend = Autodiff<NdArray>;
    static DEVICE: Lazy<NdArrayDevice> = Lazy::new(NdArrayDevice::default);

    fn agent(config: A2CAgentConfig) -> A2CAgent<TestBackend, MLP<TestBackend>, MLP<TestBackend>, CartPole, 2> {
        let actor = MLPConfig::new(4, vec![16], 2).init(&*DEVICE);
        let critic = MLPConfig::new(4, vec![16], 1).init(&*DEVICE);
        A2CAgent::new(actor, critic, config, &*DEVICE)
    }

    #[test]
    fn test_update_every_n_steps() {
        let config = A2CAgentConfig {
            n_steps: 4,
            seed: Some(1),
            ..Default::default()
        };
        let mut agent = agent(config);
        let mut env = CartPole::new(500, 1);
        env.reset();

        let mut updates = 0;
        for _ in 0..8 {
            let info = agent.step(&mut env);
            if info.done {
                env.reset();
            }
            if let Some(metrics) = info.metrics {
                updates += 1;
                assert_eq!(metrics.n_updates, 1);
                assert!(metrics.policy_loss.is_finite());
                assert!(metrics.value_loss.is_finite());
                assert!(metrics.entropy > 0.0);
            }
        }
        assert!(updates >= 2);
        assert_eq!(agent.total_steps(), 8);
    }

    #[test]
    fn test_learn_changes_weights() {
        let mut agent = agent(A2CAgentConfig {
            n_steps: 16,
            seed: Some(2),
            ..Default::default()
        });
        let mut env = CartPole::new(500, 2);
        env.reset();

        let before = params::flat_params(&agent.actor);
        for _ in 0..10 {
            let info = agent.step(&mut env);
            if info.done {
                env.reset();
            }
        }
        let metrics = agent.learn(Some(&env.current_state()));

        assert_eq!(metrics.n_updates, 1);
        assert_ne!(before, params::flat_params(&agent.actor));
        assert!(agent.rollout.is_empty());
    }

    #[test]
    fn test_eval_mode_collects_nothing() {
        let mut agent = agent(A2CAgentConfig {
            seed: Some(3),
            ..Default::default()
        });
        let mut env = CartPole::new(50, 3);

        agent.eval();
        let report = agent.go(&mut env);

        assert!(!agent.should_learn());
        assert!(agent.rollout.is_empty());
        assert_eq!(report.get("steps").copied(), Some(agent.total_steps() as f64));
        agent.train();
    }

    #[test]
    fn test_empty_rollout_learn_is_noop() {
        let mut agent = agent(A2CAgentConfig::default());
        let metrics = agent.learn(None);
        assert_eq!(metrics.n_updates, 0);
    }
}
