//! Classic control environments inspired by python [gymnasium](https://gymnasium.farama.org/)

mod acrobot;
mod cart_pole;
mod mountain_car;

use std::{fmt, str::FromStr};

pub use acrobot::{Acrobot, AcrobotAction, AcrobotState};
pub use cart_pole::{CartPole, CartPoleAction, CartPoleState};
pub use mountain_car::{MCAction, MountainCar, MountainCarState};

use crate::error::RlError;

/// Identifiers of the built-in environments, spelled the way gym registers them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvId {
    CartPoleV0,
    CartPoleV1,
    MountainCarV0,
    AcrobotV1,
}

impl EnvId {
    pub const ALL: [EnvId; 4] = [
        EnvId::CartPoleV0,
        EnvId::CartPoleV1,
        EnvId::MountainCarV0,
        EnvId::AcrobotV1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvId::CartPoleV0 => "CartPole-v0",
            EnvId::CartPoleV1 => "CartPole-v1",
            EnvId::MountainCarV0 => "MountainCar-v0",
            EnvId::AcrobotV1 => "Acrobot-v1",
        }
    }

    /// Time limit of one episode
    pub fn max_episode_steps(&self) -> usize {
        match self {
            EnvId::CartPoleV0 => 200,
            EnvId::CartPoleV1 => 500,
            EnvId::MountainCarV0 => 200,
            EnvId::AcrobotV1 => 500,
        }
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvId {
    type Err = RlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EnvId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| RlError::UnknownEnv {
                id: s.to_string(),
                known: EnvId::ALL.map(|id| id.as_str()).join(", "),
            })
    }
}
