/// Uniform experience replay
pub mod replay;

/// Proportional prioritized experience replay
pub mod prioritized;

pub use prioritized::PrioritizedReplayMemory;
pub use replay::ReplayMemory;

use crate::env::Environment;

/// A single transition observed by an agent
///
/// `next_state` is `None` when the transition ended the episode.
#[derive(Debug, Clone)]
pub struct Exp<E: Environment> {
    pub state: E::State,
    pub action: E::Action,
    pub reward: f32,
    pub next_state: Option<E::State>,
}

/// A batch of transitions stored column-wise, ready for tensor conversion
#[derive(Debug, Clone)]
pub struct ExpBatch<E: Environment> {
    pub states: Vec<E::State>,
    pub actions: Vec<E::Action>,
    pub rewards: Vec<f32>,
    pub next_states: Vec<Option<E::State>>,
}

impl<E: Environment> ExpBatch<E> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            states: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            next_states: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, exp: &Exp<E>) {
        self.states.push(exp.state.clone());
        self.actions.push(exp.action.clone());
        self.rewards.push(exp.reward);
        self.next_states.push(exp.next_state.clone());
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// The replay memory variants a [`DQNAgent`](crate::algo::dqn::DQNAgent) can learn from
#[derive(Debug, Clone)]
pub enum Memory<E: Environment> {
    Base(ReplayMemory<E>),
    Prioritized(PrioritizedReplayMemory<E>),
}

impl<E: Environment> Memory<E> {
    pub fn push(&mut self, exp: Exp<E>) {
        match self {
            Memory::Base(memory) => {
                memory.push(exp);
            }
            Memory::Prioritized(memory) => memory.push(exp),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Memory::Base(memory) => memory.len(),
            Memory::Prioritized(memory) => memory.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
