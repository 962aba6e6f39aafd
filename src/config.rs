//! Hyper-parameter file
//!
//! An optional TOML file overrides the defaults of each algorithm. Every section and every key is
//! optional:
//!
//! ```toml
//! hidden_layers = [64, 64]
//!
//! [dqn]
//! lr = 1e-3
//! prioritized_replay = true
//!
//! [ppo]
//! n_steps = 1024
//! target_kl = 0.02
//! ```

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    algo::{a2c::A2CAgentConfig, dqn::DQNAgentConfig, ppo::PPOAgentConfig, trpo::TRPOAgentConfig},
    decay,
    error::{Result, RlError},
};

/// Network architecture and per-algorithm hyper-parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    /// Hidden layer widths shared by every network
    pub hidden_layers: Vec<usize>,
    pub dqn: DqnSection,
    pub ppo: PPOAgentConfig,
    pub a2c: A2CAgentConfig,
    pub trpo: TRPOAgentConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            hidden_layers: vec![64, 64],
            dqn: DqnSection::default(),
            ppo: PPOAgentConfig::default(),
            a2c: A2CAgentConfig::default(),
            trpo: TRPOAgentConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Read and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hidden_layers.contains(&0) {
            return Err(RlError::InvalidArgument(format!(
                "hidden layer widths must be positive, got {:?}",
                self.hidden_layers
            )));
        }
        self.dqn.validate()
    }
}

/// DQN settings, named after the usual baseline flags
///
/// Exploration is given as a fraction of the run, so the agent configuration depends on the number
/// of timesteps and is built with [`DqnSection::agent_config`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DqnSection {
    pub lr: f64,
    pub gamma: f32,
    pub buffer_size: usize,
    pub batch_size: usize,
    pub learning_starts: usize,
    pub train_freq: usize,
    pub target_update_interval: usize,
    pub tau: f32,
    pub double_q: bool,
    pub prioritized_replay: bool,
    pub prioritized_replay_alpha: f32,
    pub prioritized_replay_beta0: f32,
    /// Fraction of the run over which ε is annealed from 1
    pub exploration_fraction: f32,
    pub exploration_final_eps: f32,
    pub gradient_clip: Option<f32>,
}

impl Default for DqnSection {
    fn default() -> Self {
        let agent = DQNAgentConfig::default();
        Self {
            lr: agent.lr,
            gamma: agent.gamma,
            buffer_size: agent.memory_capacity,
            batch_size: agent.memory_batch_size,
            learning_starts: agent.learning_starts,
            train_freq: agent.train_freq,
            target_update_interval: agent.target_update_interval,
            tau: agent.tau,
            double_q: agent.double_q,
            prioritized_replay: agent.use_prioritized_memory,
            prioritized_replay_alpha: agent.prioritized_memory_alpha,
            prioritized_replay_beta0: agent.prioritized_memory_beta_0,
            exploration_fraction: 0.1,
            exploration_final_eps: 0.02,
            gradient_clip: agent.gradient_clip,
        }
    }
}

impl DqnSection {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.exploration_fraction) {
            return Err(RlError::InvalidArgument(format!(
                "dqn.exploration_fraction must be in [0, 1], got {}",
                self.exploration_fraction
            )));
        }
        if !(0.0..=1.0).contains(&self.exploration_final_eps) {
            return Err(RlError::InvalidArgument(format!(
                "dqn.exploration_final_eps must be in [0, 1], got {}",
                self.exploration_final_eps
            )));
        }
        if self.buffer_size == 0 || self.batch_size == 0 {
            return Err(RlError::InvalidArgument(
                "dqn.buffer_size and dqn.batch_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Agent configuration for a run of `number_timesteps` steps
    ///
    /// ε decays linearly from 1 to `exploration_final_eps` over
    /// `exploration_fraction · number_timesteps` steps and β is annealed over the whole run.
    pub fn agent_config(&self, number_timesteps: u64, seed: Option<u64>) -> Result<DQNAgentConfig<decay::Linear>> {
        self.validate()?;
        let timesteps = usize::try_from(number_timesteps).unwrap_or(usize::MAX);
        let exploration_steps = (self.exploration_fraction as f64 * timesteps as f64) as usize;

        Ok(DQNAgentConfig {
            memory_capacity: self.buffer_size,
            memory_batch_size: self.batch_size,
            use_prioritized_memory: self.prioritized_replay,
            prioritized_memory_alpha: self.prioritized_replay_alpha,
            prioritized_memory_beta_0: self.prioritized_replay_beta0,
            prioritized_memory_beta_steps: timesteps,
            epsilon_decay_strategy: decay::Linear::new(1.0, self.exploration_final_eps, exploration_steps)?,
            gamma: self.gamma,
            learning_starts: self.learning_starts,
            train_freq: self.train_freq,
            target_update_interval: self.target_update_interval,
            tau: self.tau,
            lr: self.lr,
            double_q: self.double_q,
            gradient_clip: self.gradient_clip,
            seed,
        })
    }
}
