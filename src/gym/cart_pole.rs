use gym_rs::{
    core::{ActionReward, Env},
    envs::classical_control::cartpole::{CartPoleEnv, CartPoleObservation},
    spaces::BoxR,
    utils::{custom::types::O64, renderer::RenderMode},
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use strum::{FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Report};

/// Half-width of the uniform box every state variable starts in
const START_BOUND: f64 = 0.05;

/// State representation: [x, x_dot, θ, θ_dot]
pub type CartPoleState = [f32; 4];

fn obs2arr(observation: CartPoleObservation) -> CartPoleState {
    let values = Vec::from(observation);
    [values[0] as f32, values[1] as f32, values[2] as f32, values[3] as f32]
}

fn start_bounds() -> BoxR<CartPoleObservation> {
    let high = CartPoleObservation::new(
        O64::from(START_BOUND),
        O64::from(START_BOUND),
        O64::from(START_BOUND),
        O64::from(START_BOUND),
    );
    BoxR::new(-high, high)
}

/// Actions for the [`CartPole`] environment
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CartPoleAction {
    Left = 0,
    Right = 1,
}

impl From<usize> for CartPoleAction {
    fn from(value: usize) -> Self {
        Self::from_repr(value).expect("CartPoleAction::from is only called with valid values [0, 1]")
    }
}

impl From<CartPoleAction> for usize {
    fn from(action: CartPoleAction) -> Self {
        action as usize
    }
}

/// The classic cart-pole balancing task
///
/// A pole is hinged to a cart moving along a frictionless track. The agent pushes the cart left or right
/// and receives a reward of 1 for every step the pole stays upright. The episode ends when the pole
/// leans more than 12°, the cart leaves the track, or `max_steps` is reached
/// (200 for `CartPole-v0`, 500 for `CartPole-v1`).
///
/// This implementation is a thin wrapper around [gym_rs](https://github.com/MathisWellmann/gym-rs)
/// which adds the time limit. Each episode is reseeded from the wrapper's own generator, so a given
/// `seed` always yields the same sequence of episodes.
#[derive(Debug, Clone)]
pub struct CartPole {
    gym_env: CartPoleEnv,
    steps: usize,
    max_steps: usize,
    done: bool,
    rng: StdRng,
    pub report: Report,
}

impl CartPole {
    pub fn new(max_steps: usize, seed: u64) -> Self {
        let mut env = Self {
            gym_env: CartPoleEnv::new(RenderMode::None),
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

impl Default for CartPole {
    fn default() -> Self {
        Self::new(500, 0)
    }
}

impl Environment for CartPole {
    type State = CartPoleState;
    type Action = CartPoleAction;

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
        obs2arr(self.gym_env.reset(Some(seed), false, Some(start_bounds())).0)
    }

    fn current_state(&self) -> Self::State {
        obs2arr(self.gym_env.state)
    }

    fn random_action(&mut self) -> Self::Action {
        CartPoleAction::from(self.rng.gen_range(0..CartPoleAction::VARIANTS.len()))
    }

    fn is_active(&self) -> bool {
        !self.done
    }
}

impl DiscreteActionSpace for CartPole {
    fn actions(&self) -> Vec<Self::Action> {
        CartPoleAction::VARIANTS.to_vec()
    }
}
