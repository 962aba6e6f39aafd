//! Deep reinforcement learning experiments on burn
//!
//! DQN, PPO, A2C and TRPO agents for discrete-action environments, the classic control tasks they
//! are benchmarked on, and a [`runner`] that trains any pairing of the two for a fixed number of
//! timesteps while measuring throughput and episode scores.

pub mod algo;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod decay;
pub mod ds;
pub mod env;
pub mod error;
pub mod exploration;
pub mod gym;
pub mod logging;
pub mod memory;
pub mod nn;
pub mod runner;
pub mod traits;

pub use error::{Result, RlError};
