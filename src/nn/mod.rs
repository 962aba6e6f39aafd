//! Neural network building blocks for RL algorithms

pub mod mlp;
pub mod params;

pub use mlp::{MLPConfig, MLP};
