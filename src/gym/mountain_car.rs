use gym_rs::{
    core::{ActionReward, Env},
    envs::classical_control::mountain_car::{MountainCarEnv, MountainCarObservation},
    utils::renderer::RenderMode,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strum::{FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Report};

/// State representation: [position, velocity]
pub type MountainCarState = [f32; 2];

fn obs2arr(observation: MountainCarObservation) -> MountainCarState {
    [*observation.position as f32, *observation.velocity as f32]
}

/// Actions for the [`MountainCar`] environment
/// 0 = push left, 1 = no push, 2 = push right
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MCAction {
    PushLeft = 0,
    NoPush = 1,
    PushRight = 2,
}

impl From<usize> for MCAction {
    fn from(value: usize) -> Self {
        Self::from_repr(value).expect("MCAction::from is only called with valid values [0, 1, 2]")
    }
}

impl From<MCAction> for usize {
    fn from(action: MCAction) -> Self {
        action as usize
    }
}

/// The classic Mountain Car task with discrete actions
///
/// An underpowered car must rock back and forth in a valley to build enough momentum to reach the flag
/// on the right hill. Every step costs -1 until the car reaches position 0.5 or `max_steps` elapse.
///
/// This implementation is a thin wrapper around [gym_rs](https://github.com/MathisWellmann/gym-rs)
/// which adds the time limit and seeds every reset from `seed`.
#[derive(Debug, Clone)]
pub struct MountainCar {
    gym_env: MountainCarEnv,
    steps: usize,
    max_steps: usize,
    done: bool,
    rng: StdRng,
    pub report: Report,
}

impl MountainCar {
    pub fn new(max_steps: usize, seed: u64) -> Self {
        let mut env = Self {
            gym_env: MountainCarEnv::new(RenderMode::None),
            steps: 0,
            max_steps,
            done: false,
            rng: StdRng::seed_from_u64(seed),
            report: Report::new(vec!["reward", "steps"]),
        };
        env.reset();
        env
    }
}

impl Environment for MountainCar {
    type State = MountainCarState;
    type Action = MCAction;

    fn step(&mut self, action: Self::Action) -> (Option<Self::State>, f32) {
        let ActionReward {
            observation,
            reward,
            done,
            ..
        } = self.gym_env.step(action as usize);
        self.steps += 1;

        let reward = *reward as f32;
        self.report.entry("reward").and_modify(|x| *x += reward as f64);
        self.report.entry("steps").and_modify(|x| *x += 1.0);

        self.done = done || self.steps >= self.max_steps;
        let next_state = if self.done {
            None
        } else {
            Some(obs2arr(observation))
        };

        (next_state, reward)
    }

    fn reset(&mut self) -> Self::State {
        self.steps = 0;
        self.done = false;
        let seed = self.rng.gen();
        obs2arr(self.gym_env.reset(Some(seed), false, None).0)
    }

    fn current_state(&self) -> Self::State {
        obs2arr(self.gym_env.state)
    }

    fn random_action(&mut self) -> Self::Action {
        MCAction::from(self.rng.gen_range(0..MCAction::VARIANTS.len()))
    }

    fn is_active(&self) -> bool {
        !self.done
    }
}

impl DiscreteActionSpace for MountainCar {
    fn actions(&self) -> Vec<Self::Action> {
        MCAction::VARIANTS.to_vec()
    }
}
