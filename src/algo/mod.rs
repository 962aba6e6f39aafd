use std::fmt;

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, AdamW, AdamWConfig},
    tensor::backend::AutodiffBackend,
};
use clap::ValueEnum;

/// Advantage Actor-Critic
pub mod a2c;

/// Returns and generalized advantage estimation
pub mod advantage;

/// Deep Q Network
pub mod dqn;

/// Actor/critic traits and rollout storage for the policy gradient agents
pub mod policy;

/// Proximal Policy Optimization
pub mod ppo;

/// Trust Region Policy Optimization
pub mod trpo;

/// The training routines selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Algorithm {
    Dqn,
    Ppo,
    A2c,
    Trpo,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [Algorithm::Dqn, Algorithm::Ppo, Algorithm::A2c, Algorithm::Trpo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Dqn => "dqn",
            Algorithm::Ppo => "ppo",
            Algorithm::A2c => "a2c",
            Algorithm::Trpo => "trpo",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AdamW with optional gradient value clipping, the optimizer every agent trains with
pub(crate) fn adamw<B, M>(gradient_clip: Option<f32>) -> OptimizerAdaptor<AdamW, M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    AdamWConfig::new()
        .with_grad_clipping(gradient_clip.map(GradientClippingConfig::Value))
        .init()
}
