use std::path::PathBuf;

use clap::Parser;

use crate::{
    algo::Algorithm,
    error::{Result, RlError},
    gym::EnvId,
};

#[derive(Parser, Debug, Clone)]
#[command(name = "run")]
#[command(version)]
#[command(about = "Train a deep RL agent on a classic control environment", long_about = None)]
pub struct Args {
    /// Environment id, e.g. CartPole-v1, MountainCar-v0, Acrobot-v1
    #[arg(long)]
    pub env: EnvId,

    /// Training routine
    #[arg(long, value_enum)]
    pub algorithm: Algorithm,

    /// Total environment steps, scientific notation allowed (1e5)
    #[arg(long = "number_timesteps", value_parser = parse_timesteps)]
    pub number_timesteps: u64,

    /// Seed for the environment, the agent and the tensor backend
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// TOML file with network and algorithm hyper-parameters
    #[arg(long, env = "RLEXP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory the trained networks are written to
    #[arg(long = "save_path")]
    pub save_path: Option<PathBuf>,

    /// Episodes between progress log lines
    #[arg(long = "log_interval", default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub log_interval: u64,
}

/// Parse a positive whole number of timesteps, written as an integer or in scientific notation
pub fn parse_timesteps(s: &str) -> Result<u64> {
    let invalid = || RlError::InvalidTimesteps(s.to_string());
    let trimmed = s.trim();

    if let Ok(n) = trimmed.parse::<u64>() {
        return if n > 0 { Ok(n) } else { Err(invalid()) };
    }

    let value = trimmed.parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() || value < 1.0 || value.fract() != 0.0 || value >= u64::MAX as f64 {
        return Err(invalid());
    }
    Ok(value as u64)
}
