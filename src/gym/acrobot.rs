use std::f32::consts::PI;

use rand::{rngs::StdRng, Rng, SeedableRng};
use strum::{FromRepr, VariantArray};

use crate::env::{DiscreteActionSpace, Environment, Report};

const DT: f32 = 0.2;
const GRAVITY: f32 = 9.8;
const LINK_LENGTH_1: f32 = 1.0;
const LINK_MASS_1: f32 = 1.0;
const LINK_MASS_2: f32 = 1.0;
const LINK_COM_POS_1: f32 = 0.5;
const LINK_COM_POS_2: f32 = 0.5;
const LINK_MOI: f32 = 1.0;
const MAX_VEL_1: f32 = 4.0 * PI;
const MAX_VEL_2: f32 = 9.0 * PI;

/// Observation: [cos θ1, sin θ1, cos θ2, sin θ2, θ1_dot, θ2_dot]
pub type AcrobotState = [f32; 6];

/// Torque applied at the joint between the two links
#[derive(FromRepr, VariantArray, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcrobotAction {
    Negative = 0,
    Zero = 1,
    Positive = 2,
}

impl AcrobotAction {
    fn torque(self) -> f32 {
        self as i32 as f32 - 1.0
    }
}

impl From<usize> for AcrobotAction {
    fn from(value: usize) -> Self {
        Self::from_repr(value).expect("AcrobotAction::from is only called with valid values [0, 1, 2]")
    }
}

impl From<AcrobotAction> for usize {
    fn from(action: AcrobotAction) -> Self {
        action as usize
    }
}

/// The two-link underactuated pendulum swing-up task
///
/// Only the joint between the links is actuated. The goal is to swing the tip above a line one link
/// length above the base. Each step costs -1 until the goal is reached or `max_steps` elapse.
/// Dynamics follow Sutton & Barto's formulation, integrated with one RK4 step per `DT`.
#[derive(Debug, Clone)]
pub struct Acrobot {
    // θ1, θ2, θ1_dot, θ2_dot
    joints: [f32; 4],
    steps: usize,
    max_steps: usize,
    done: bool,
    rng: StdRng,
    pub report: Report,
}

impl Acrobot {
    pub fn new(max_steps: usize, seed: u64) -> Self {
        let mut env = Self {
            joints: [0.0; 4],
            steps: 0,
            max_steps,
            done: false,
            rng: StdRng::seed_from_u64(seed),
            report: Report::new(vec!["reward", "steps"]),
        };
        env.reset();
        env
    }

    fn observe(&self) -> AcrobotState {
        let [theta1, theta2, dtheta1, dtheta2] = self.joints;
        [theta1.cos(), theta1.sin(), theta2.cos(), theta2.sin(), dtheta1, dtheta2]
    }

    fn reached_goal(&self) -> bool {
        let [theta1, theta2, _, _] = self.joints;
        -theta1.cos() - (theta1 + theta2).cos() > 1.0
    }
}

/// Time derivative of the joint state under torque `a`
fn dynamics(s: [f32; 4], a: f32) -> [f32; 4] {
    let [theta1, theta2, dtheta1, dtheta2] = s;
    let (m1, m2) = (LINK_MASS_1, LINK_MASS_2);
    let (l1, lc1, lc2) = (LINK_LENGTH_1, LINK_COM_POS_1, LINK_COM_POS_2);
    let (i1, i2) = (LINK_MOI, LINK_MOI);

    let d1 = m1 * lc1 * lc1 + m2 * (l1 * l1 + lc2 * lc2 + 2.0 * l1 * lc2 * theta2.cos()) + i1 + i2;
    let d2 = m2 * (lc2 * lc2 + l1 * lc2 * theta2.cos()) + i2;
    let phi2 = m2 * lc2 * GRAVITY * (theta1 + theta2 - PI / 2.0).cos();
    let phi1 = -m2 * l1 * lc2 * dtheta2 * dtheta2 * theta2.sin()
        - 2.0 * m2 * l1 * lc2 * dtheta2 * dtheta1 * theta2.sin()
        + (m1 * lc1 + m2 * l1) * GRAVITY * (theta1 - PI / 2.0).cos()
        + phi2;

    let ddtheta2 = (a + d2 / d1 * phi1 - m2 * l1 * lc2 * dtheta1 * dtheta1 * theta2.sin() - phi2)
        / (m2 * lc2 * lc2 + i2 - d2 * d2 / d1);
    let ddtheta1 = -(d2 * ddtheta2 + phi1) / d1;

    [dtheta1, dtheta2, ddtheta1, ddtheta2]
}

fn rk4(s: [f32; 4], a: f32, dt: f32) -> [f32; 4] {
    let offset = |s: [f32; 4], k: [f32; 4], h: f32| std::array::from_fn(|i| s[i] + h * k[i]);

    let k1 = dynamics(s, a);
    let k2 = dynamics(offset(s, k1, dt / 2.0), a);
    let k3 = dynamics(offset(s, k2, dt / 2.0), a);
    let k4 = dynamics(offset(s, k3, dt), a);

    std::array::from_fn(|i| s[i] + dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
}

/// Wrap `x` into `[-π, π]`
fn wrap_angle(x: f32) -> f32 {
    (x + PI).rem_euclid(2.0 * PI) - PI
}

impl Environment for Acrobot {
    type State = AcrobotState;
    type Action = AcrobotAction;

    fn step(&mut self, action: Self::Action) -> (Option<Self::State>, f32) {
        let [theta1, theta2, dtheta1, dtheta2] = rk4(self.joints, action.torque(), DT);
        self.joints = [
            wrap_angle(theta1),
            wrap_angle(theta2),
            dtheta1.clamp(-MAX_VEL_1, MAX_VEL_1),
            dtheta2.clamp(-MAX_VEL_2, MAX_VEL_2),
        ];
        self.steps += 1;

        let reached_goal = self.reached_goal();
        let reward = if reached_goal { 0.0 } else { -1.0 };
        self.report.entry("reward").and_modify(|x| *x += reward as f64);
        self.report.entry("steps").and_modify(|x| *x += 1.0);

        self.done = reached_goal || self.steps >= self.max_steps;
        let next_state = if self.done { None } else { Some(self.observe()) };

        (next_state, reward)
    }

    fn reset(&mut self) -> Self::State {
        for joint in self.joints.iter_mut() {
            *joint = self.rng.gen_range(-0.1..0.1);
        }
        self.steps = 0;
        self.done = false;
        self.observe()
    }

    fn current_state(&self) -> Self::State {
        self.observe()
    }

    fn random_action(&mut self) -> Self::Action {
        AcrobotAction::from(self.rng.gen_range(0..AcrobotAction::VARIANTS.len()))
    }

    fn is_active(&self) -> bool {
        !self.done
    }
}

impl DiscreteActionSpace for Acrobot {
    fn actions(&self) -> Vec<Self::Action> {
        AcrobotAction::VARIANTS.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_is_on_unit_circle() {
        let mut env = Acrobot::new(500, 3);
        let obs = env.reset();
        assert!((obs[0] * obs[0] + obs[1] * obs[1] - 1.0).abs() < 1e-5);
        assert!((obs[2] * obs[2] + obs[3] * obs[3] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hanging_at_rest_stays_at_rest() {
        let mut env = Acrobot::new(500, 0);
        env.joints = [0.0; 4];
        env.step(AcrobotAction::Zero);
        assert!(env.joints.iter().all(|v| v.abs() < 1e-4), "{:?}", env.joints);
    }

    #[test]
    fn velocities_are_bounded_and_angles_wrapped() {
        let mut env = Acrobot::new(500, 0);
        env.reset();
        for i in 0..200 {
            let action = if (i / 5) % 2 == 0 { AcrobotAction::Positive } else { AcrobotAction::Negative };
            if env.step(action).0.is_none() {
                break;
            }
            let [theta1, theta2, dtheta1, dtheta2] = env.joints;
            assert!(theta1.abs() <= PI + 1e-5 && theta2.abs() <= PI + 1e-5);
            assert!(dtheta1.abs() <= MAX_VEL_1 && dtheta2.abs() <= MAX_VEL_2);
        }
    }

    #[test]
    fn upright_is_terminal_with_zero_reward() {
        let mut env = Acrobot::new(500, 0);
        env.joints = [PI, 0.0, 0.0, 0.0];
        let (next, reward) = env.step(AcrobotAction::Zero);
        assert!(next.is_none());
        assert_eq!(reward, 0.0);
    }

    #[test]
    fn wrap_angle_maps_into_range() {
        // ±π are the same angle
        assert!((wrap_angle(3.0 * PI).abs() - PI).abs() < 1e-5);
        assert!((wrap_angle(-2.5 * PI) + 0.5 * PI).abs() < 1e-5);
        assert!((wrap_angle(0.3) - 0.3).abs() < 1e-6);
        assert!((wrap_angle(0.3 + 20.0 * PI) - 0.3).abs() < 1e-3);
    }

    #[test]
    fn wrap_angle_returns_on_infinite_input() {
        assert!(wrap_angle(f32::INFINITY).is_nan());
        assert!(wrap_angle(f32::NEG_INFINITY).is_nan());
    }
}
