//! Scalar schedules, used for ε-greedy exploration and other annealed hyperparameters

use crate::error::{Result, RlError};

/// A value that changes as a function of the number of elapsed steps
pub trait Decay {
    /// The value of the schedule after `step` steps
    fn evaluate(&self, step: usize) -> f32;
}

/// A schedule that never changes
#[derive(Debug, Clone, Copy)]
pub struct Constant(pub f32);

impl Decay for Constant {
    fn evaluate(&self, _step: usize) -> f32 {
        self.0
    }
}

/// Linear interpolation from `start` to `end` over `steps` steps, then constant at `end`
#[derive(Debug, Clone, Copy)]
pub struct Linear {
    start: f32,
    end: f32,
    steps: usize,
}

impl Linear {
    pub fn new(start: f32, end: f32, steps: usize) -> Result<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(RlError::InvalidArgument(format!(
                "linear schedule bounds must be finite, got {start} -> {end}"
            )));
        }
        Ok(Self { start, end, steps })
    }
}

impl Default for Linear {
    /// `1.0 -> 0.02` over 10 000 steps
    fn default() -> Self {
        Self {
            start: 1.0,
            end: 0.02,
            steps: 10_000,
        }
    }
}

impl Decay for Linear {
    fn evaluate(&self, step: usize) -> f32 {
        if self.steps == 0 {
            return self.end;
        }
        let fraction = (step as f32 / self.steps as f32).min(1.0);
        self.start + fraction * (self.end - self.start)
    }
}

/// Exponential decay `end + (start - end) · e^(-rate · step)`
#[derive(Debug, Clone, Copy)]
pub struct Exponential {
    rate: f32,
    start: f32,
    end: f32,
}

impl Exponential {
    pub fn new(rate: f32, start: f32, end: f32) -> Result<Self> {
        if rate <= 0.0 || !rate.is_finite() {
            return Err(RlError::InvalidArgument(format!(
                "exponential decay rate must be positive, got {rate}"
            )));
        }
        if start < end {
            return Err(RlError::InvalidArgument(format!(
                "exponential decay must decrease, got {start} -> {end}"
            )));
        }
        Ok(Self { rate, start, end })
    }
}

impl Decay for Exponential {
    fn evaluate(&self, step: usize) -> f32 {
        self.end + (self.start - self.end) * (-self.rate * step as f32).exp()
    }
}
