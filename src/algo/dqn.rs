//! Deep Q-Network (DQN)
//!
//! DQN is a value-based algorithm that approximates the action-value function Q(s,a) with a neural
//! network and acts greedily with respect to it, with ε-greedy exploration on top.
//!
//! ## Key Features
//! - **Experience replay**: Stores transitions and samples them to break correlations
//! - **Target network**: A slowly-updated copy of the Q-network used for the TD targets
//! - **ε-greedy exploration**: ε follows any [`Decay`] schedule, linear by default
//! - **Double Q-learning**: The online network picks `a*`, the target network evaluates it
//! - **Optional prioritized replay**: Samples transitions with a large TD error more often
//!
//! # Learning step
//!
//! For a batch `(s, a, r, s')` with importance weights `w` (all ones without prioritized replay):
//!
//! ```text
//! a*     = argmax_a Q_online(s', a)         (argmax over Q_target when double_q is off)
//! target = r + γ · (1 − done) · Q_target(s', a*)
//! loss   = mean(w · huber(target − Q_online(s, a)))
//! ```
//!
//! New priorities are `|target − Q_online(s, a)| + 1e-6`.
//!
//! # Usage Example
//!
//! ```rust,ignore
//! use rlexp::{algo::dqn::{DQNAgent, DQNAgentConfig}, decay, gym::CartPole, nn::MLPConfig};
//!
//! let model = MLPConfig::new(4, vec![64, 64], 2).init::<Backend>(&DEVICE);
//! let config = DQNAgentConfig {
//!     epsilon_decay_strategy: decay::Linear::new(1.0, 0.02, 10_000)?,
//!     use_prioritized_memory: true,
//!     ..Default::default()
//! };
//! let mut agent = DQNAgent::<_, _, CartPole, _, 2>::new(model, config, &*DEVICE)?;
//!
//! for episode in 0..1000 {
//!     let report = agent.go(&mut env);
//!     println!("Episode {}: reward = {:?}", episode, report.get("reward"));
//! }
//! ```
//!
//! # Hyperparameter Tuning
//! - **Learning rate**: 1e-4 to 1e-3
//! - **Replay buffer**: 10k-1M transitions, **batch size**: 32-128
//! - **Target update**: every 100-1000 steps with τ = 1, or every step with τ = 0.001-0.01
//! - **Epsilon**: from 1.0 down to 0.01-0.1 over the first 10% of training
//!
//! Reference: "Playing Atari with Deep Reinforcement Learning" (Mnih et al., 2013)

use std::{collections::HashMap, path::Path};

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, AdamW, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, warn};

use super::adamw;
use crate::{
    checkpoint,
    decay::{self, Decay},
    env::{Environment, Report},
    error::Result,
    exploration::{Choice, EpsilonGreedy},
    memory::{Exp, ExpBatch, Memory, PrioritizedReplayMemory, ReplayMemory},
    nn::MLP,
    traits::{float_tensor, index_tensor, StepInfo, ToTensor, TrainableAgent, TrainingMetrics},
};

/// Offset added to absolute TD errors so that no priority is zero
const PRIORITY_EPSILON: f32 = 1e-6;

/// A burn module used with a Deep Q network agent
///
/// ### Generics
/// - `B` - A burn backend
/// - `D` - The dimension of the input tensor
pub trait DQNModel<B: AutodiffBackend, const D: usize>: AutodiffModule<B> {
    /// Forward pass through the model, one Q value per action
    fn forward(&self, input: Tensor<B, D>) -> Tensor<B, 2>;

    /// Soft update the parameters of the target network
    ///
    /// θ′ ← τθ + (1 − τ)θ′
    ///
    /// ```ignore
    /// target_net.soft_update(&policy_net, tau);
    /// ```
    fn soft_update(&mut self, other: &Self, tau: f32);
}

impl<B: AutodiffBackend> DQNModel<B, 2> for MLP<B> {
    fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        MLP::forward(self, input)
    }

    fn soft_update(&mut self, other: &Self, tau: f32) {
        MLP::soft_update(self, other, tau)
    }
}

/// Configuration for the [`DQNAgent`]
#[derive(Debug, Clone)]
pub struct DQNAgentConfig<D> {
    /// The capacity of the replay memory
    ///
    /// **Default:** `50000`
    pub memory_capacity: usize,
    /// The size of batches to be sampled from the replay memory
    ///
    /// **Default:** `32`
    pub memory_batch_size: usize,
    /// Use [`PrioritizedReplayMemory`] instead of the base [`ReplayMemory`]
    ///
    /// **Default:** `false`
    pub use_prioritized_memory: bool,
    /// The prioritization exponent α (see [`PrioritizedReplayMemory`])
    ///
    /// **Default:** `0.6`
    pub prioritized_memory_alpha: f32,
    /// The initial importance sampling exponent β<sub>0</sub>, annealed to 1
    ///
    /// **Default:** `0.4`
    pub prioritized_memory_beta_0: f32,
    /// The number of environment steps over which β is annealed
    ///
    /// **Default:** `100000`
    pub prioritized_memory_beta_steps: usize,
    /// The epsilon decay strategy
    ///
    /// **Default:** [`Linear`](decay::Linear) decay from `1.0` to `0.02` over `10000` steps
    pub epsilon_decay_strategy: D,
    /// The discount factor
    ///
    /// **Default:** `0.99`
    pub gamma: f32,
    /// Number of environment steps collected before the first update
    ///
    /// **Default:** `1000`
    pub learning_starts: usize,
    /// Number of environment steps between updates
    ///
    /// **Default:** `1`
    pub train_freq: usize,
    /// Number of environment steps between target network updates
    ///
    /// **Default:** `500`
    pub target_update_interval: usize,
    /// The rate at which the target network moves toward the policy network, `1.0` copies it
    ///
    /// **Default:** `1.0`
    pub tau: f32,
    /// The learning rate for the optimizer
    ///
    /// **Default:** `1e-3`
    pub lr: f64,
    /// Select next actions with the online network (double DQN)
    ///
    /// **Default:** `true`
    pub double_q: bool,
    /// Gradient clipping value
    ///
    /// **Default:** `Some(10.0)`
    pub gradient_clip: Option<f32>,
    /// Seed for exploration and replay sampling, entropy if unset
    ///
    /// **Default:** `None`
    pub seed: Option<u64>,
}

impl Default for DQNAgentConfig<decay::Linear> {
    fn default() -> Self {
        Self {
            memory_capacity: 50_000,
            memory_batch_size: 32,
            use_prioritized_memory: false,
            prioritized_memory_alpha: 0.6,
            prioritized_memory_beta_0: 0.4,
            prioritized_memory_beta_steps: 100_000,
            epsilon_decay_strategy: decay::Linear::default(),
            gamma: 0.99,
            learning_starts: 1000,
            train_freq: 1,
            target_update_interval: 500,
            tau: 1.0,
            lr: 1e-3,
            double_q: true,
            gradient_clip: Some(10.0),
            seed: None,
        }
    }
}

/// A Deep Q Network agent
///
/// ### Generics
/// - `B` - A burn backend
/// - `M` - The [`DQNModel`] used for the policy and target networks
/// - `E` - The [`Environment`] in which the agent will learn
///     - The environment's action space must be discrete, since the policy network produces a Q value for each action.
///     - The state and action types' implementations of [`Clone`] should be very lightweight, as they are cloned often.
/// - `DEC` - The decay strategy for epsilon-greedy exploration
/// - `D` - The dimension of the input
pub struct DQNAgent<B, M, E, DEC, const D: usize>
where
    B: AutodiffBackend,
    E: Environment,
    M: DQNModel<B, D>,
    DEC: Decay,
{
    policy_net: M,
    target_net: M,
    device: &'static B::Device,
    memory: Memory<E>,
    optimizer: OptimizerAdaptor<AdamW, M, B>,
    exploration: EpsilonGreedy<DEC>,
    rng: StdRng,
    gamma: f32,
    learning_starts: usize,
    train_freq: usize,
    target_update_interval: usize,
    tau: f32,
    lr: f64,
    double_q: bool,
    total_steps: usize,
    learn_mode: bool,
}

impl<B, M, E, DEC, const D: usize> DQNAgent<B, M, E, DEC, D>
where
    B: AutodiffBackend,
    M: DQNModel<B, D>,
    E: Environment,
    DEC: Decay,
    Vec<E::State>: ToTensor<B, D, Float>,
    E::Action: From<usize> + Into<usize>,
{
    /// Initialize a new `DQNAgent`
    ///
    /// ### Arguments
    /// - `model` A [`DQNModel`] to be used as the policy and target networks
    /// - `config` A [`DQNAgentConfig`] containing components and hyperparameters for the agent
    /// - `device` A static reference to the device used for the `model`
    pub fn new(model: M, config: DQNAgentConfig<DEC>, device: &'static B::Device) -> Result<Self> {
        let memory = if config.use_prioritized_memory {
            Memory::Prioritized(PrioritizedReplayMemory::new(
                config.memory_capacity,
                config.memory_batch_size,
                config.prioritized_memory_alpha,
                config.prioritized_memory_beta_0,
                config.prioritized_memory_beta_steps,
            )?)
        } else {
            Memory::Base(ReplayMemory::new(config.memory_capacity, config.memory_batch_size))
        };

        let rng = config
            .seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);

        Ok(Self {
            target_net: model.clone(),
            policy_net: model,
            device,
            memory,
            optimizer: adamw(config.gradient_clip),
            exploration: EpsilonGreedy::new(config.epsilon_decay_strategy),
            rng,
            gamma: config.gamma,
            learning_starts: config.learning_starts,
            train_freq: config.train_freq.max(1),
            target_update_interval: config.target_update_interval.max(1),
            tau: config.tau,
            lr: config.lr,
            double_q: config.double_q,
            total_steps: 0,
            learn_mode: true,
        })
    }

    /// Current exploration rate
    pub fn epsilon(&self) -> f32 {
        self.exploration.epsilon(self.total_steps)
    }

    /// Index of the action with the highest Q value in `state`
    pub fn greedy_action(&self, state: &E::State) -> usize {
        let input = vec![state.clone()].to_tensor(self.device);
        let best = self.policy_net.forward(input).detach().argmax(1).into_scalar();
        best.elem::<i64>() as usize
    }

    /// Invoke the agent's policy along with the exploration strategy to choose an action from the given state
    ///
    /// Always greedy in evaluation mode.
    fn act(&mut self, env: &mut E, state: &E::State) -> E::Action {
        if !self.learn_mode {
            return self.greedy_action(state).into();
        }
        match self.exploration.choose(self.total_steps, &mut self.rng) {
            Choice::Explore => env.random_action(),
            Choice::Exploit => self.greedy_action(state).into(),
        }
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

    /// Sample a batch, along with importance weights and the sampled slots for prioritized memories
    fn sample(&mut self) -> Option<(ExpBatch<E>, Vec<f32>, Option<Vec<usize>>)> {
        match &self.memory {
            Memory::Base(memory) => memory.sample_zipped(&mut self.rng).map(|batch| {
                let weights = vec![1.0; batch.len()];
                (batch, weights, None)
            }),
            Memory::Prioritized(memory) => memory
                .sample_zipped(self.total_steps, &mut self.rng)
                .map(|(batch, weights, indices)| (batch, weights, Some(indices))),
        }
    }

    /// Bellman targets `r + γ·(1 − done)·Q_target(s′, a*)`
    ///
    /// `a*` is the online network's greedy action with double Q-learning, the target network's otherwise.
    /// No gradient flows through the targets.
    fn bellman_targets(&self, batch: &ExpBatch<E>) -> Tensor<B, 2> {
        let not_done = batch
            .next_states
            .iter()
            .map(|s| if s.is_some() { 1.0 } else { 0.0 })
            .collect::<Vec<f32>>();

        // Terminal rows get their own state as a placeholder, masked out by `not_done`
        let next_states = batch
            .next_states
            .iter()
            .zip(&batch.states)
            .map(|(next, state)| next.as_ref().unwrap_or(state).clone())
            .collect::<Vec<_>>()
            .to_tensor(self.device);
        let rewards = float_tensor::<B>(&batch.rewards, self.device).unsqueeze_dim::<2>(1);
        let not_done = float_tensor::<B>(&not_done, self.device).unsqueeze_dim::<2>(1);

        let next_q_target = self.target_net.forward(next_states.clone()).detach();
        let next_q = if self.double_q {
            let best = self.policy_net.forward(next_states).detach().argmax(1);
            next_q_target.gather(1, best)
        } else {
            next_q_target.max_dim(1)
        };
        rewards + next_q * not_done * self.gamma
    }

    /// Perform one DQN learning step
    fn learn_internal(&mut self) -> Option<TrainingMetrics> {
        let (batch, weights, indices) = self.sample()?;
        let batch_size = batch.len();

        let targets = self.bellman_targets(&batch);

        let states = batch.states.to_tensor(self.device);
        let actions = batch.actions.into_iter().map(Into::into).collect::<Vec<usize>>();
        let actions = index_tensor::<B>(&actions, self.device).unsqueeze_dim::<2>(1);
        let weights = float_tensor::<B>(&weights, self.device).unsqueeze_dim::<2>(1);

        // Q values of the chosen actions
        let q_values = self.policy_net.forward(states).gather(1, actions);

        let td_errors = targets - q_values.clone();
        let loss = (huber(td_errors.clone()) * weights).mean();

        let loss_value = loss.clone().into_scalar().elem::<f32>();
        let mean_q = q_values.detach().mean().into_scalar().elem::<f32>();

        let grads = GradientsParams::from_grads(loss.backward(), &self.policy_net);
        self.policy_net = self.optimizer.step(self.lr, self.policy_net.clone(), grads);

        if let (Memory::Prioritized(memory), Some(indices)) = (&mut self.memory, indices) {
            let priorities = td_errors
                .detach()
                .into_data()
                .iter::<f32>()
                .map(|td| td.abs() + PRIORITY_EPSILON)
                .collect::<Vec<_>>();
            if let Err(err) = memory.update_priorities(&indices, &priorities) {
                warn!(%err, "Skipping priority update");
            }
        }

        let epsilon = self.epsilon();
        debug!(step = self.total_steps, loss = loss_value, mean_q, epsilon, "DQN update");

        Some(TrainingMetrics {
            value_loss: loss_value,
            n_updates: 1,
            extra: HashMap::from([
                ("mean_q".to_string(), mean_q),
                ("epsilon".to_string(), epsilon),
                ("batch_size".to_string(), batch_size as f32),
            ]),
            ..Default::default()
        })
    }
}

/// Elementwise Huber loss with δ = 1: `0.5·x²` for `|x| ≤ 1`, `|x| − 0.5` beyond
fn huber<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let abs = x.abs();
    let quadratic = abs.clone().clamp_max(1.0);
    let linear = abs - quadratic.clone();
    quadratic.powf_scalar(2.0) * 0.5 + linear
}

impl<B, M, E, DEC, const D: usize> TrainableAgent<E> for DQNAgent<B, M, E, DEC, D>
where
    B: AutodiffBackend,
    M: DQNModel<B, D>,
    E: Environment,
    DEC: Decay,
    Vec<E::State>: ToTensor<B, D, Float>,
    E::Action: From<usize> + Into<usize>,
{
    fn step(&mut self, env: &mut E) -> StepInfo {
        let state = env.current_state();
        let action = self.act(env, &state);

        let (next_state, reward) = env.step(action.clone());
        let done = next_state.is_none();
        self.total_steps += 1;

        if !self.learn_mode {
            return StepInfo { reward, done, metrics: None };
        }

        self.memory.push(Exp {
            state,
            action,
            reward,
            next_state,
        });

        let metrics = self.should_learn().then(|| self.learn(None));

        // synced on environment steps, independently of `train_freq`
        if self.total_steps > self.learning_starts && self.total_steps % self.target_update_interval == 0 {
            self.target_net.soft_update(&self.policy_net, self.tau);
        }

        StepInfo { reward, done, metrics }
    }

    fn should_learn(&self) -> bool {
        let batch_size = match &self.memory {
            Memory::Base(memory) => memory.batch_size,
            Memory::Prioritized(memory) => memory.batch_size,
        };
        self.learn_mode
            && self.total_steps > self.learning_starts
            && self.total_steps % self.train_freq == 0
            && self.memory.len() >= batch_size
    }

    /// Replay-based update, `next_state` is not needed
    fn learn(&mut self, _next_state: Option<&E::State>) -> TrainingMetrics {
        self.learn_internal().unwrap_or_default()
    }

    /// Nothing is tied to the current episode; the replay memory is kept
    fn reset_episode(&mut self) {}

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
        checkpoint::save_module(&self.policy_net, dir, "q_network")?;
        checkpoint::save_module(&self.target_net, dir, "q_target")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        gym::{CartPole, CartPoleAction},
        nn::{params, MLPConfig},
    };
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };
    use once_cell::sync::Lazy;

    type TestBackend = Autodiff<NdArray>;
    type TestAgent = DQNAgent<TestBackend, MLP<TestBackend>, CartPole, decay::Linear, 2>;
    static DEVICE: Lazy<NdArrayDevice> = Lazy::new(NdArrayDevice::default);

    fn small_config() -> DQNAgentConfig<decay::Linear> {
        DQNAgentConfig {
            memory_capacity: 256,
            memory_batch_size: 8,
            learning_starts: 16,
            target_update_interval: 4,
            prioritized_memory_beta_steps: 100,
            epsilon_decay_strategy: decay::Linear::new(1.0, 0.1, 50).unwrap(),
            seed: Some(0),
            ..Default::default()
        }
    }

    fn agent(config: DQNAgentConfig<decay::Linear>) -> TestAgent {
        let model = MLPConfig::new(4, vec![16], 2).init(&*DEVICE);
        DQNAgent::new(model, config, &*DEVICE).unwrap()
    }

    fn run(agent: &mut TestAgent, steps: usize) -> Vec<TrainingMetrics> {
        let mut env = CartPole::new(500, 0);
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
    fn test_learning_starts_after_warmup() {
        let mut agent = agent(small_config());

        let updates = run(&mut agent, 40);

        // Updates on steps 17..=40
        assert_eq!(updates.len(), 24);
        for metrics in &updates {
            assert_eq!(metrics.n_updates, 1);
            assert!(metrics.value_loss.is_finite());
            assert!(metrics.extra["mean_q"].is_finite());
        }
    }

    #[test]
    fn test_train_freq() {
        let mut agent = agent(DQNAgentConfig {
            train_freq: 4,
            ..small_config()
        });

        let updates = run(&mut agent, 40);

        // Steps 20, 24, ..., 40
        assert_eq!(updates.len(), 6);
    }

    #[test]
    fn test_epsilon_follows_schedule() {
        let mut agent = agent(small_config());
        assert_eq!(agent.epsilon(), 1.0);

        run(&mut agent, 50);
        assert!((agent.epsilon() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_hard_target_update_copies_policy() {
        let mut agent = agent(DQNAgentConfig {
            target_update_interval: 1,
            tau: 1.0,
            ..small_config()
        });

        run(&mut agent, 20);

        let policy = params::flat_params(&agent.policy_net);
        let target = params::flat_params(&agent.target_net);
        for (p, t) in policy.iter().zip(&target) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    #[test]
    fn test_target_sync_counts_env_steps() {
        let mut agent = agent(DQNAgentConfig {
            train_freq: 4,
            target_update_interval: 8,
            tau: 1.0,
            ..small_config()
        });

        let updates = run(&mut agent, 24);

        // two updates (steps 20 and 24), but the target follows env step 24
        assert_eq!(updates.len(), 2);
        let policy = params::flat_params(&agent.policy_net);
        let target = params::flat_params(&agent.target_net);
        for (p, t) in policy.iter().zip(&target) {
            assert!((p - t).abs() < 1e-6);
        }
    }

    /// A linear Q network over 4 inputs where only the first input matters:
    /// `Q(e0) = [q0, q1]`, and `Q(0) = [0, 0]`
    fn linear_q(q0: f32, q1: f32) -> MLP<TestBackend> {
        let model = MLPConfig::new(4, vec![], 2).init(&*DEVICE);
        let mut values = vec![0.0; 10];
        values[0] = q0;
        values[1] = q1;
        params::set_flat_params(model, &values)
    }

    fn bellman_agent(config: DQNAgentConfig<decay::Linear>) -> TestAgent {
        let mut agent = DQNAgent::new(linear_q(0.0, 0.0), config, &*DEVICE).unwrap();
        // online prefers action 1, target values action 0 higher
        agent.policy_net = linear_q(0.0, 1.0);
        agent.target_net = linear_q(2.0, 1.0);
        agent
    }

    fn two_row_batch() -> ExpBatch<CartPole> {
        ExpBatch {
            states: vec![[0.0; 4]; 2],
            actions: vec![CartPoleAction::Left; 2],
            rewards: vec![0.5, 0.5],
            next_states: vec![Some([1.0, 0.0, 0.0, 0.0]), None],
        }
    }

    #[test]
    fn test_bellman_targets() {
        let double = bellman_agent(DQNAgentConfig {
            gamma: 0.9,
            double_q: true,
            ..small_config()
        });
        let vanilla = bellman_agent(DQNAgentConfig {
            gamma: 0.9,
            double_q: false,
            ..small_config()
        });

        let batch = two_row_batch();
        let double = double.bellman_targets(&batch).into_data().iter::<f32>().collect::<Vec<_>>();
        let vanilla = vanilla.bellman_targets(&batch).into_data().iter::<f32>().collect::<Vec<_>>();

        // double: 0.5 + 0.9 * Q_target(s', 1), vanilla: 0.5 + 0.9 * max Q_target(s'), terminal: 0.5
        assert!((double[0] - 1.4).abs() < 1e-5, "{double:?}");
        assert!((vanilla[0] - 2.3).abs() < 1e-5, "{vanilla:?}");
        assert!((double[1] - 0.5).abs() < 1e-6);
        assert!((vanilla[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_priorities_are_absolute_td_errors() {
        let mut agent = bellman_agent(DQNAgentConfig {
            gamma: 0.9,
            double_q: true,
            use_prioritized_memory: true,
            prioritized_memory_alpha: 1.0,
            memory_batch_size: 1,
            ..small_config()
        });
        agent.memory.push(Exp {
            state: [0.0; 4],
            action: CartPoleAction::Left,
            reward: 0.5,
            next_state: Some([1.0, 0.0, 0.0, 0.0]),
        });

        let metrics = agent.learn_internal().unwrap();
        assert_eq!(metrics.n_updates, 1);

        // Q(s, a) = 0 so |td| = 1.4, and α = 1 stores it unchanged
        let Memory::Prioritized(memory) = &agent.memory else {
            panic!("expected a prioritized memory");
        };
        assert!((memory.priority(0) - (1.4 + PRIORITY_EPSILON)).abs() < 1e-5);
    }

    #[test]
    fn test_prioritized_memory_learns() {
        let mut agent = agent(DQNAgentConfig {
            use_prioritized_memory: true,
            double_q: false,
            ..small_config()
        });

        let updates = run(&mut agent, 40);

        assert_eq!(updates.len(), 24);
        assert!(updates.iter().all(|m| m.value_loss.is_finite()));
    }

    #[test]
    fn test_eval_mode_is_greedy_and_stores_nothing() {
        let mut agent = agent(small_config());
        run(&mut agent, 10);
        let stored = agent.memory.len();

        agent.eval();
        let updates = run(&mut agent, 30);

        assert!(updates.is_empty());
        assert_eq!(agent.memory.len(), stored);
        assert!(!agent.should_learn());
    }

    #[test]
    fn test_huber() {
        let device = NdArrayDevice::default();
        let x = Tensor::<NdArray, 1>::from_floats([-3.0, -0.5, 0.0, 0.5, 2.0], &device);
        let loss = huber(x).into_data().iter::<f32>().collect::<Vec<_>>();
        assert_eq!(loss, vec![2.5, 0.125, 0.0, 0.125, 1.5]);
    }
}
