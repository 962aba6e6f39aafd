//! The interface between agents and the environments they learn in

use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::Debug,
};

/// A reinforcement learning environment
///
/// States and actions are cloned often, so their [`Clone`] implementations should be cheap.
/// Ideally both types are [`Copy`].
pub trait Environment {
    /// The observation handed to the agent
    type State: Clone + Debug;
    /// The action taken by the agent
    type Action: Clone + Debug;

    /// Apply `action`, returning the next state and the reward
    ///
    /// The next state is `None` once the episode is over, whether the environment reached a terminal
    /// state or hit its time limit.
    fn step(&mut self, action: Self::Action) -> (Option<Self::State>, f32);

    /// Start a new episode and return its initial state
    fn reset(&mut self) -> Self::State;

    /// The state the environment is currently in
    fn current_state(&self) -> Self::State;

    /// A uniformly random action
    fn random_action(&mut self) -> Self::Action;

    /// Whether the current episode is still running
    fn is_active(&self) -> bool;
}

/// An environment with a finite set of actions
///
/// Actions are identified with indices `0..num_actions()`, which is how policies output them.
pub trait DiscreteActionSpace: Environment {
    /// Every available action, ordered by index
    fn actions(&self) -> Vec<Self::Action>;

    fn num_actions(&self) -> usize {
        self.actions().len()
    }
}

/// Named statistics accumulated over an episode
///
/// Keys keep the order they were registered in, so [`Report::values`] can be zipped with [`Report::keys`].
#[derive(Debug, Clone, Default)]
pub struct Report {
    keys: Vec<&'static str>,
    values: HashMap<&'static str, f64>,
}

impl Report {
    pub fn new(keys: Vec<&'static str>) -> Self {
        let values = keys.iter().map(|&k| (k, 0.0)).collect();
        Self { keys, values }
    }

    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    pub fn get(&self, key: &str) -> Option<&f64> {
        self.values.get(key)
    }

    pub fn entry(&mut self, key: &'static str) -> Entry<'_, &'static str, f64> {
        self.values.entry(key)
    }

    /// Values in key order
    pub fn values(&self) -> Vec<f64> {
        self.keys
            .iter()
            .map(|k| self.values.get(k).copied().unwrap_or_default())
            .collect()
    }

    /// Return the current report and reset every value to zero
    pub fn take(&mut self) -> Self {
        let taken = self.clone();
        for value in self.values.values_mut() {
            *value = 0.0;
        }
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accumulates_and_resets() {
        let mut report = Report::new(vec!["reward", "steps"]);
        report.entry("reward").and_modify(|x| *x += 1.5);
        report.entry("reward").and_modify(|x| *x += 1.0);
        report.entry("steps").and_modify(|x| *x += 2.0);

        let taken = report.take();
        assert_eq!(taken.get("reward"), Some(&2.5));
        assert_eq!(taken.values(), vec![2.5, 2.0]);
        assert_eq!(taken.keys(), &["reward", "steps"]);
        assert_eq!(report.get("reward"), Some(&0.0));
    }
}
