//! Timestep-bounded training runs
//!
//! [`run`] builds the environment and the agent selected by [`RunOptions`], steps them together until
//! `number_timesteps` environment steps have been taken and reports throughput and episode scores.

use std::{
    collections::VecDeque,
    fmt,
    path::PathBuf,
    time::{Duration, Instant},
};

use burn::{backend::Autodiff, prelude::*};
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::{
    algo::{
        a2c::{A2CAgent, A2CAgentConfig},
        dqn::DQNAgent,
        ppo::{PPOAgent, PPOAgentConfig},
        trpo::{TRPOAgent, TRPOAgentConfig},
        Algorithm,
    },
    config::ExperimentConfig,
    decay,
    env::{DiscreteActionSpace, Environment},
    error::{Result, RlError},
    gym::{Acrobot, CartPole, EnvId, MountainCar},
    nn::{MLPConfig, MLP},
    traits::TrainableAgent,
};

#[cfg(not(feature = "wgpu"))]
type InnerBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
type InnerBackend = burn::backend::Wgpu;

/// Backend every run trains on
pub type RunBackend = Autodiff<InnerBackend>;

static DEVICE: Lazy<<InnerBackend as Backend>::Device> = Lazy::new(Default::default);

/// Number of most recent episodes the reported mean reward is taken over
pub const REWARD_WINDOW: usize = 100;

/// What to train, and for how long
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub env: EnvId,
    pub algorithm: Algorithm,
    pub number_timesteps: u64,
    pub seed: u64,
    pub config: ExperimentConfig,
    pub save_path: Option<PathBuf>,
    /// Episodes between progress log lines
    pub log_interval: u64,
}

impl RunOptions {
    pub fn new(env: EnvId, algorithm: Algorithm, number_timesteps: u64) -> Self {
        Self {
            env,
            algorithm,
            number_timesteps,
            seed: 0,
            config: ExperimentConfig::default(),
            save_path: None,
            log_interval: 10,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub env: EnvId,
    pub algorithm: Algorithm,
    pub seed: u64,
    pub timesteps: u64,
    /// Completed episodes
    pub episodes: usize,
    /// Mean reward of the last [`REWARD_WINDOW`] completed episodes
    pub mean_reward: f32,
    /// Best windowed mean reward seen during the run
    pub best_mean_reward: f32,
    /// Environment steps per second
    pub fps: f64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "env={} algorithm={} seed={} timesteps={} episodes={} mean_reward={:.2} best_mean_reward={:.2} fps={:.0} elapsed={:.1}s",
            self.env,
            self.algorithm,
            self.seed,
            self.timesteps,
            self.episodes,
            self.mean_reward,
            self.best_mean_reward,
            self.fps,
            self.elapsed.as_secs_f64()
        )
    }
}

/// Rolling episode statistics
#[derive(Debug, Clone)]
pub struct EpisodeStats {
    rewards: VecDeque<f32>,
    lengths: VecDeque<usize>,
    window: usize,
    episodes: usize,
    best_mean_reward: Option<f32>,
}

impl EpisodeStats {
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            rewards: VecDeque::with_capacity(window),
            lengths: VecDeque::with_capacity(window),
            window,
            episodes: 0,
            best_mean_reward: None,
        }
    }

    pub fn push(&mut self, reward: f32, length: usize) {
        if self.rewards.len() == self.window {
            self.rewards.pop_front();
            self.lengths.pop_front();
        }
        self.rewards.push_back(reward);
        self.lengths.push_back(length);
        self.episodes += 1;

        let mean = self.mean_reward().unwrap_or(reward);
        self.best_mean_reward = Some(self.best_mean_reward.map_or(mean, |best| best.max(mean)));
    }

    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Mean reward over the window, `None` before the first episode ends
    pub fn mean_reward(&self) -> Option<f32> {
        (!self.rewards.is_empty()).then(|| self.rewards.iter().sum::<f32>() / self.rewards.len() as f32)
    }

    pub fn mean_length(&self) -> Option<f32> {
        (!self.lengths.is_empty()).then(|| self.lengths.iter().sum::<usize>() as f32 / self.lengths.len() as f32)
    }

    pub fn best_mean_reward(&self) -> Option<f32> {
        self.best_mean_reward
    }
}

/// Train the agent selected by `options` and report how it went
pub fn run(options: &RunOptions) -> Result<RunSummary> {
    if options.number_timesteps == 0 {
        return Err(RlError::InvalidTimesteps(options.number_timesteps.to_string()));
    }

    info!(
        env = %options.env,
        algorithm = %options.algorithm,
        timesteps = options.number_timesteps,
        seed = options.seed,
        "Starting run"
    );

    <InnerBackend as Backend>::seed(options.seed);

    let max_steps = options.env.max_episode_steps();
    match options.env {
        EnvId::CartPoleV0 | EnvId::CartPoleV1 => train_on(CartPole::new(max_steps, options.seed), options),
        EnvId::MountainCarV0 => train_on(MountainCar::new(max_steps, options.seed), options),
        EnvId::AcrobotV1 => train_on(Acrobot::new(max_steps, options.seed), options),
    }
}

/// Build the agent for an environment with `N`-dimensional observations and train it
fn train_on<E, const N: usize>(env: E, options: &RunOptions) -> Result<RunSummary>
where
    E: DiscreteActionSpace<State = [f32; N]>,
    E::Action: From<usize> + Into<usize>,
{
    let num_actions = env.num_actions();
    let hidden_layers = &options.config.hidden_layers;
    let mlp = |output_dim: usize| -> MLP<RunBackend> {
        MLPConfig::new(N, hidden_layers.clone(), output_dim).init(&*DEVICE)
    };
    let seed = Some(options.seed);

    match options.algorithm {
        Algorithm::Dqn => {
            let config = options.config.dqn.agent_config(options.number_timesteps, seed)?;
            let agent: DQNAgent<RunBackend, MLP<RunBackend>, E, decay::Linear, 2> =
                DQNAgent::new(mlp(num_actions), config, &DEVICE)?;
            drive(agent, env, options)
        }
        Algorithm::Ppo => {
            let config = PPOAgentConfig {
                seed,
                ..options.config.ppo.clone()
            };
            let agent: PPOAgent<RunBackend, MLP<RunBackend>, MLP<RunBackend>, E, 2> =
                PPOAgent::new(mlp(num_actions), mlp(1), config, &DEVICE);
            drive(agent, env, options)
        }
        Algorithm::A2c => {
            let config = A2CAgentConfig {
                seed,
                ..options.config.a2c.clone()
            };
            let agent: A2CAgent<RunBackend, MLP<RunBackend>, MLP<RunBackend>, E, 2> =
                A2CAgent::new(mlp(num_actions), mlp(1), config, &DEVICE);
            drive(agent, env, options)
        }
        Algorithm::Trpo => {
            let config = TRPOAgentConfig {
                seed,
                ..options.config.trpo.clone()
            };
            let agent: TRPOAgent<RunBackend, MLP<RunBackend>, MLP<RunBackend>, E, 2> =
                TRPOAgent::new(mlp(num_actions), mlp(1), config, &DEVICE);
            drive(agent, env, options)
        }
    }
}

/// Step `agent` in `env` for the requested number of timesteps
fn drive<E, A>(mut agent: A, mut env: E, options: &RunOptions) -> Result<RunSummary>
where
    E: Environment,
    A: TrainableAgent<E>,
{
    let start = Instant::now();
    let log_interval = options.log_interval.max(1) as usize;
    let mut stats = EpisodeStats::new(REWARD_WINDOW);
    let mut episode_reward = 0.0;
    let mut episode_steps = 0;

    env.reset();
    for step in 1..=options.number_timesteps {
        let info = agent.step(&mut env);
        episode_reward += info.reward;
        episode_steps += 1;

        if let Some(metrics) = &info.metrics {
            debug!(
                step,
                policy_loss = metrics.policy_loss,
                value_loss = metrics.value_loss,
                entropy = metrics.entropy,
                approx_kl = ?metrics.approx_kl,
                early_stopped = metrics.early_stopped,
                "Update"
            );
        }

        if info.done {
            stats.push(episode_reward, episode_steps);
            if stats.episodes() % log_interval == 0 {
                info!(
                    steps = step,
                    episodes = stats.episodes(),
                    mean_reward = stats.mean_reward().unwrap_or_default(),
                    mean_length = stats.mean_length().unwrap_or_default(),
                    fps = step as f64 / start.elapsed().as_secs_f64().max(f64::EPSILON),
                    "Progress"
                );
            }
            episode_reward = 0.0;
            episode_steps = 0;
            env.reset();
        }
    }
    let elapsed = start.elapsed();

    if let Some(dir) = &options.save_path {
        agent.save(dir)?;
    }

    // A run shorter than one episode reports the partial episode
    let mean_reward = stats.mean_reward().unwrap_or(episode_reward);
    let summary = RunSummary {
        env: options.env,
        algorithm: options.algorithm,
        seed: options.seed,
        timesteps: agent.total_steps() as u64,
        episodes: stats.episodes(),
        mean_reward,
        best_mean_reward: stats.best_mean_reward().unwrap_or(mean_reward),
        fps: agent.total_steps() as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        elapsed,
    };
    info!(%summary, "Run finished");
    Ok(summary)
}
