//! Trust Region Policy Optimization (TRPO)
//!
//! TRPO maximizes the surrogate advantage `L(θ) = E[π_θ(a|s) / π_old(a|s) · A]` subject to a bound
//! on the mean KL divergence between the old and the new policy. Each update:
//!
//! 1. computes the policy gradient `g = ∇L(θ_old)`
//! 2. solves `F·x = g` with conjugate gradient, where `F` is the Fisher information matrix of the
//!    policy, only ever used through Fisher-vector products
//! 3. scales the natural gradient to the trust region: `β = sqrt(2·max_kl / xᵀFx)`
//! 4. backtracks along `β·x` until the KL bound holds and the surrogate improves
//!
//! The critic is fitted separately with Adam on the GAE returns.
//!
//! Fisher-vector products are directional derivatives of `∇KL(π_old ‖ π_θ)`, taken as a central
//! finite difference of two first-order gradients since burn does not differentiate twice.
//!
//! Reference: "Trust Region Policy Optimization" (Schulman et al., 2015)

use std::{collections::HashMap, path::Path};

use burn::{
    optim::{adaptor::OptimizerAdaptor, Adam, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{
        activation::{log_softmax, softmax},
        backend::AutodiffBackend,
    },
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{
    advantage,
    policy::{self, ActorModel, CriticModel, Rollout},
};
use crate::{
    checkpoint,
    env::{Environment, Report},
    error::Result,
    nn::params,
    traits::{float_tensor, index_tensor, StepInfo, ToTensor, TrainableAgent, TrainingMetrics},
};

/// Length of the parameter-space step used for finite-difference Fisher-vector products
const FVP_STEP: f32 = 1e-3;

/// Line search step shrink factor
const BACKTRACK_RATIO: f32 = 0.5;

/// Configuration for TRPO agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TRPOAgentConfig {
    /// Discount factor γ (default: 0.99)
    pub gamma: f32,
    /// GAE lambda λ (default: 0.98)
    pub gae_lambda: f32,
    /// Trust region radius, the maximum mean KL of an update (default: 0.01)
    pub max_kl: f32,
    /// Conjugate gradient iterations (default: 10)
    pub cg_iters: usize,
    /// Damping added to Fisher-vector products (default: 0.1)
    pub cg_damping: f32,
    /// Line search backtracking steps (default: 10)
    pub max_backtracks: usize,
    /// Number of steps to collect before update (default: 1024)
    pub n_steps: usize,
    /// Critic learning rate (default: 3e-4)
    pub vf_lr: f64,
    /// Critic epochs per update (default: 5)
    pub vf_iters: usize,
    /// Critic minibatch size (default: 64)
    pub vf_batch_size: usize,
    /// Seed for action sampling and minibatch shuffling, entropy if unset
    pub seed: Option<u64>,
}

impl Default for TRPOAgentConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            gae_lambda: 0.98,
            max_kl: 0.01,
            cg_iters: 10,
            cg_damping: 0.1,
            max_backtracks: 10,
            n_steps: 1024,
            vf_lr: 3e-4,
            vf_iters: 5,
            vf_batch_size: 64,
            seed: None,
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solve `A·x = b` for symmetric positive definite `A`, given only the product `v ↦ A·v`
///
/// Stops after `iters` iterations or once the squared residual drops below `tolerance`.
pub fn conjugate_gradient<F>(mut apply: F, b: &[f32], iters: usize, tolerance: f32) -> Vec<f32>
where
    F: FnMut(&[f32]) -> Vec<f32>,
{
    let mut x = vec![0.0; b.len()];
    let mut r = b.to_vec();
    let mut p = b.to_vec();
    let mut r_dot_r = dot(&r, &r);

    for _ in 0..iters {
        if r_dot_r < tolerance {
            break;
        }
        let z = apply(&p);
        let p_dot_z = dot(&p, &z);
        if p_dot_z <= 0.0 || !p_dot_z.is_finite() {
            break;
        }
        let alpha = r_dot_r / p_dot_z;
        x.iter_mut().zip(&p).for_each(|(x, p)| *x += alpha * p);
        r.iter_mut().zip(&z).for_each(|(r, z)| *r -= alpha * z);

        let next_r_dot_r = dot(&r, &r);
        let mu = next_r_dot_r / r_dot_r;
        p.iter_mut().zip(&r).for_each(|(p, r)| *p = r + mu * *p);
        r_dot_r = next_r_dot_r;
    }
    x
}

/// The fixed data an update evaluates candidate policies on
struct Batch<B: AutodiffBackend, const D: usize> {
    states: Tensor<B, D>,
    actions: Tensor<B, 1, Int>,
    advantages: Tensor<B, 1>,
    old_log_probs: Tensor<B, 1>,
    old_probs: Tensor<B, 2>,
    old_log_probs_all: Tensor<B, 2>,
}

impl<B: AutodiffBackend, const D: usize> Batch<B, D> {
    /// `mean(π_θ(a|s) / π_old(a|s) · A)`
    fn surrogate<Actor: ActorModel<B, D>>(&self, actor: &Actor) -> Tensor<B, 1> {
        let logits = actor.forward(self.states.clone());
        let log_probs = policy::action_log_probs(logits, self.actions.clone());
        ((log_probs - self.old_log_probs.clone()).exp() * self.advantages.clone()).mean()
    }

    /// `mean(KL(π_old ‖ π_θ))` over the states
    fn kl<Actor: ActorModel<B, D>>(&self, actor: &Actor) -> Tensor<B, 1> {
        let log_probs = log_softmax(actor.forward(self.states.clone()), 1);
        (self.old_probs.clone() * (self.old_log_probs_all.clone() - log_probs))
            .sum_dim(1)
            .mean()
    }
}

/// TRPO Agent for discrete action spaces
///
/// This agent is generic over:
/// - `B`: Autodiff backend (e.g., NdArray, Wgpu)
/// - `Actor`: Actor network implementing [`ActorModel`], updated by natural gradient steps
/// - `Critic`: Critic network implementing [`CriticModel`], fitted with Adam
/// - `E`: Environment with discrete action space
/// - `D`: Dimension of the batched state tensor
pub struct TRPOAgent<B, Actor, Critic, E, const D: usize>
where
    B: AutodiffBackend,
    E: Environment,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
{
    actor: Actor,
    critic: Critic,
    optimizer_critic: OptimizerAdaptor<Adam, Critic, B>,

    rollout: Rollout<E::State>,
    device: &'static B::Device,
    rng: StdRng,
    config: TRPOAgentConfig,

    total_steps: usize,
    learn_mode: bool,
}

impl<B, Actor, Critic, E, const D: usize> TRPOAgent<B, Actor, Critic, E, D>
where
    B: AutodiffBackend,
    Actor: ActorModel<B, D>,
    Critic: CriticModel<B, D>,
    E: Environment,
    E::Action: From<usize>,
    Vec<E::State>: ToTensor<B, D, Float>,
{
    /// Create a new TRPO agent
    pub fn new(actor: Actor, critic: Critic, config: TRPOAgentConfig, device: &'static B::Device) -> Self {
        let rng = config
            .seed
            .map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);

        Self {
            actor,
            critic,
            optimizer_critic: AdamConfig::new().init(),
            rollout: Rollout::with_capacity(config.n_steps),
            device,
            rng,
            config: TRPOAgentConfig {
                n_steps: config.n_steps.max(1),
                vf_batch_size: config.vf_batch_size.max(1),
                ..config
            },
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

    /// Gradient of the mean KL to the old policy at parameters `theta`
    fn kl_grad(&self, batch: &Batch<B, D>, theta: &[f32]) -> Vec<f32> {
        let actor = params::set_flat_params(self.actor.clone(), theta);
        let grads = batch.kl(&actor).backward();
        params::flat_grads(&actor, &grads)
    }

    /// Damped Fisher-vector product `(F + damping·I)·v` around `theta`
    fn fisher_vector_product(&self, batch: &Batch<B, D>, theta: &[f32], v: &[f32]) -> Vec<f32> {
        let norm = dot(v, v).sqrt();
        if norm == 0.0 {
            return vec![0.0; v.len()];
        }
        let h = FVP_STEP / norm;

        let shifted = |sign: f32| theta.iter().zip(v).map(|(t, v)| t + sign * h * v).collect::<Vec<_>>();
        let plus = self.kl_grad(batch, &shifted(1.0));
        let minus = self.kl_grad(batch, &shifted(-1.0));

        plus.iter()
            .zip(&minus)
            .zip(v)
            .map(|((p, m), v)| (p - m) / (2.0 * h) + self.config.cg_damping * v)
            .collect()
    }

    /// Natural gradient step on the actor, returns `(surrogate, kl, line_search_failed)`
    fn update_policy(&mut self, batch: &Batch<B, D>) -> (f32, f32, bool) {
        let theta_old = params::flat_params(&self.actor);

        let surrogate = batch.surrogate(&self.actor);
        let surrogate_old = surrogate.clone().into_scalar().elem::<f32>();
        let g = params::flat_grads(&self.actor, &surrogate.backward());

        if dot(&g, &g) == 0.0 {
            return (surrogate_old, 0.0, false);
        }

        let step_dir = conjugate_gradient(
            |v| self.fisher_vector_product(batch, &theta_old, v),
            &g,
            self.config.cg_iters,
            1e-10,
        );
        let shs = dot(&step_dir, &self.fisher_vector_product(batch, &theta_old, &step_dir));
        if shs <= 0.0 || !shs.is_finite() {
            warn!(shs, "TRPO step direction has no positive curvature, keeping policy");
            return (surrogate_old, 0.0, true);
        }

        let beta = (2.0 * self.config.max_kl / shs).sqrt();
        let full_step = step_dir.iter().map(|x| beta * x).collect::<Vec<_>>();

        let mut fraction = 1.0;
        for backtrack in 0..self.config.max_backtracks {
            let theta_new = theta_old
                .iter()
                .zip(&full_step)
                .map(|(t, s)| t + fraction * s)
                .collect::<Vec<_>>();
            let candidate = params::set_flat_params(self.actor.clone(), &theta_new);

            let surrogate_new = batch.surrogate(&candidate).detach().into_scalar().elem::<f32>();
            let kl = batch.kl(&candidate).detach().into_scalar().elem::<f32>();
            let improvement = surrogate_new - surrogate_old;

            if kl.is_finite() && kl <= 1.5 * self.config.max_kl && improvement > 0.0 {
                debug!(backtrack, kl, improvement, "TRPO line search accepted");
                self.actor = candidate;
                return (surrogate_new, kl, false);
            }
            fraction *= BACKTRACK_RATIO;
        }

        warn!("TRPO line search failed, keeping policy");
        (surrogate_old, 0.0, true)
    }

    /// Adam regression of the critic onto the returns, returns the mean loss
    fn update_critic(&mut self, returns: &[f32]) -> f32 {
        let n_samples = self.rollout.len();
        let mut indices = (0..n_samples).collect::<Vec<_>>();
        let mut total_loss = 0.0;
        let mut n_updates = 0;

        for _ in 0..self.config.vf_iters {
            indices.shuffle(&mut self.rng);
            for batch_indices in indices.chunks(self.config.vf_batch_size) {
                let states = batch_indices
                    .iter()
                    .map(|&i| self.rollout.states[i].clone())
                    .collect::<Vec<_>>()
                    .to_tensor(self.device);
                let targets = batch_indices.iter().map(|&i| returns[i]).collect::<Vec<_>>();
                let targets = float_tensor::<B>(&targets, self.device);

                let values = self.critic.forward(states).squeeze_dims(&[1]);
                let loss = (targets - values).powf_scalar(2.0).mean();
                total_loss += loss.clone().into_scalar().elem::<f32>();
                n_updates += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &self.critic);
                self.critic = self.optimizer_critic.step(self.config.vf_lr, self.critic.clone(), grads);
            }
        }

        if n_updates > 0 {
            total_loss / n_updates as f32
        } else {
            0.0
        }
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
            self.config.gamma,
            self.config.gae_lambda,
        );
        advantage::normalize(&mut advantages);

        let states = self.rollout.states.clone().to_tensor(self.device);
        let actions = index_tensor::<B>(&self.rollout.actions, self.device);
        let old_logits = self.actor.forward(states.clone()).detach();
        let batch = Batch {
            old_log_probs: policy::action_log_probs(old_logits.clone(), actions.clone()),
            old_probs: softmax(old_logits.clone(), 1),
            old_log_probs_all: log_softmax(old_logits.clone(), 1),
            advantages: float_tensor::<B>(&advantages, self.device),
            states,
            actions,
        };
        let entropy = policy::mean_entropy(old_logits).into_scalar().elem::<f32>();

        let (surrogate, kl, line_search_failed) = self.update_policy(&batch);
        let value_loss = self.update_critic(&returns);

        let n_samples = self.rollout.len();
        self.rollout.clear();

        debug!(n_samples, surrogate, kl, value_loss, "TRPO update");

        TrainingMetrics {
            policy_loss: surrogate,
            value_loss,
            entropy,
            approx_kl: Some(kl),
            n_updates: 1,
            early_stopped: line_search_failed,
            extra: HashMap::from([("line_search_failed".to_string(), line_search_failed as u8 as f32)]),
            ..Default::default()
        }
    }
}

impl<B, Actor, Critic, E, const D: usize> TrainableAgent<E> for TRPOAgent<B, Actor, Critic, E, D>
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
        self.learn_mode && self.rollout.len() >= self.config.n_steps
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
        checkpoint::save_module(&self.actor, dir, "trpo_actor")?;
        checkpoint::save_module(&self.critic, dir, "trpo_critic")?;
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
    type TestAgent = TRPOAgent<TestBackend, MLP<TestBackend>, MLP<TestBackend>, CartPole, 2>;
    static DEVICE: Lazy<NdArrayDevice> = Lazy::new(NdArrayDevice::default);

    fn agent(config: TRPOAgentConfig) -> TestAgent {
        let actor = MLPConfig::new(4, vec![16], 2).init(&*DEVICE);
        let critic = MLPConfig::new(4, vec![16], 1).init(&*DEVICE);
        TRPOAgent::new(actor, critic, config, &*DEVICE)
    }

    fn fill(agent: &mut TestAgent, steps: usize) -> (CartPole, Vec<TrainingMetrics>) {
        let mut env = CartPole::new(500, 5);
        env.reset();
        let mut updates = Vec::new();
        for _ in 0..steps {
            let info = agent.step(&mut env);
            updates.extend(info.metrics);
            if info.done {
                env.reset();
            }
        }
        (env, updates)
    }

    #[test]
    fn test_conjugate_gradient_solves_spd_system() {
        let a = [[4.0_f32, 1.0, 0.0], [1.0, 3.0, 0.5], [0.0, 0.5, 2.0]];
        let b = [1.0_f32, 2.0, 3.0];
        let apply = |v: &[f32]| {
            a.iter()
                .map(|row| row.iter().zip(v).map(|(a, v)| a * v).sum())
                .collect::<Vec<f32>>()
        };

        let x = conjugate_gradient(apply, &b, 10, 1e-10);

        let ax = apply(&x);
        for (lhs, rhs) in ax.iter().zip(&b) {
            assert!((lhs - rhs).abs() < 1e-4, "{ax:?} != {b:?}");
        }
    }

    #[test]
    fn test_conjugate_gradient_zero_rhs() {
        let x = conjugate_gradient(|v| v.to_vec(), &[0.0, 0.0], 10, 1e-10);
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn test_fisher_vector_product_is_positive_definite() {
        let mut agent = agent(TRPOAgentConfig {
            n_steps: 64,
            seed: Some(0),
            ..Default::default()
        });
        fill(&mut agent, 32);

        let states = agent.rollout.states.clone().to_tensor(agent.device);
        let actions = index_tensor::<TestBackend>(&agent.rollout.actions, agent.device);
        let old_logits = agent.actor.forward(states.clone()).detach();
        let batch = Batch {
            old_log_probs: policy::action_log_probs(old_logits.clone(), actions.clone()),
            old_probs: softmax(old_logits.clone(), 1),
            old_log_probs_all: log_softmax(old_logits, 1),
            advantages: float_tensor::<TestBackend>(&vec![1.0; agent.rollout.len()], agent.device),
            states,
            actions,
        };

        let theta = params::flat_params(&agent.actor);
        let v = theta.iter().enumerate().map(|(i, _)| ((i % 7) as f32 - 3.0) * 0.1).collect::<Vec<_>>();
        let fv = agent.fisher_vector_product(&batch, &theta, &v);

        assert_eq!(fv.len(), v.len());
        // vᵀ(F + λI)v ≥ λ‖v‖² since F is positive semi-definite
        let vfv = dot(&v, &fv);
        assert!(vfv >= 0.9 * agent.config.cg_damping * dot(&v, &v), "vᵀFv = {vfv}");
    }

    #[test]
    fn test_update_respects_trust_region() {
        let mut agent = agent(TRPOAgentConfig {
            n_steps: 64,
            vf_iters: 2,
            vf_batch_size: 32,
            seed: Some(1),
            ..Default::default()
        });

        let (_, updates) = fill(&mut agent, 64);

        assert_eq!(updates.len(), 1);
        let metrics = &updates[0];
        let kl = metrics.approx_kl.unwrap();
        assert!(kl <= 1.5 * agent.config.max_kl + 1e-6);
        assert!(metrics.value_loss.is_finite());
        assert!(metrics.entropy > 0.0);
        assert!(agent.rollout.is_empty());
    }
}
