//! Multi-layer perceptron shared by every agent in the crate
//!
//! Q-networks, actors and critics are all plain MLPs over flat observations: ReLU between layers and a
//! linear output head, so the output is a Q-value vector, action logits or a scalar value depending on
//! `output_dim`.

use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

use super::params;

/// Configuration for [`MLP`]
#[derive(Config, Debug)]
pub struct MLPConfig {
    /// Input dimension
    pub input_dim: usize,
    /// Hidden layer widths, e.g. `[64, 64]` for two hidden layers of 64 units
    pub hidden_layers: Vec<usize>,
    /// Output dimension
    pub output_dim: usize,
}

impl MLPConfig {
    /// Initialize the MLP with the given configuration
    ///
    /// With no hidden layers the network is a single linear map from input to output.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MLP<B> {
        let widths = std::iter::once(self.input_dim)
            .chain(self.hidden_layers.iter().copied())
            .chain(std::iter::once(self.output_dim))
            .collect::<Vec<_>>();

        let layers = widths
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();

        MLP { layers }
    }
}

/// Feedforward network with ReLU hidden activations and a linear output layer
#[derive(Module, Debug)]
pub struct MLP<B: Backend> {
    layers: Vec<Linear<B>>,
}

impl<B: Backend> MLP<B> {
    /// Forward pass over any tensor rank, the last dimension being the features
    ///
    /// - D=1: single example `[features]`
    /// - D=2: batch `[batch, features]`
    /// - D=3: `[batch, seq, features]`
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let last = self.layers.len() - 1;
        self.layers
            .iter()
            .enumerate()
            .fold(input, |x, (i, layer)| {
                let x = layer.forward(x);
                if i < last {
                    relu(x)
                } else {
                    x
                }
            })
    }

    /// Soft update: θ′ ← τθ + (1 − τ)θ′
    ///
    /// Moves `self` (target) toward `other` (online) by factor `tau`. `tau = 1` copies `other`.
    pub fn soft_update(&mut self, other: &Self, tau: f32) {
        *self = params::soft_update(other, self.clone(), tau);
    }

    /// Number of linear layers
    pub fn depth(&self) -> usize {
        self.layers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_mlp_forward_1d() {
        let device = NdArrayDevice::default();

        let mlp = MLPConfig::new(4, vec![64, 64], 2).init::<NdArray>(&device);
        let input = Tensor::<NdArray, 1>::random([4], burn::tensor::Distribution::Uniform(-1.0, 1.0), &device);

        let output: Tensor<NdArray, 1> = mlp.forward(input);
        assert_eq!(output.shape().dims, [2]);
    }

    #[test]
    fn test_mlp_forward_2d() {
        let device = NdArrayDevice::default();

        let mlp = MLPConfig::new(4, vec![64, 64], 2).init::<NdArray>(&device);
        let input =
            Tensor::<NdArray, 2>::random([8, 4], burn::tensor::Distribution::Uniform(-1.0, 1.0), &device);

        let output: Tensor<NdArray, 2> = mlp.forward(input);
        assert_eq!(output.shape().dims, [8, 2]);
        assert_eq!(mlp.depth(), 3);
    }

    #[test]
    fn test_mlp_no_hidden_layers() {
        let device = NdArrayDevice::default();

        let mlp = MLPConfig::new(4, vec![], 2).init::<NdArray>(&device);
        let input = Tensor::<NdArray, 2>::random([1, 4], burn::tensor::Distribution::Default, &device);

        assert_eq!(mlp.depth(), 1);
        assert_eq!(mlp.forward(input).shape().dims, [1, 2]);
    }

    #[test]
    fn test_soft_update_hard_copy() {
        let device = NdArrayDevice::default();

        let config = MLPConfig::new(2, vec![4], 1);
        let source = config.init::<NdArray>(&device);
        let mut target = config.init::<NdArray>(&device);

        let input = Tensor::<NdArray, 2>::from_floats([[0.3, -0.7]], &device);
        target.soft_update(&source, 1.0);
        let diff: f32 = (target.forward(input.clone()) - source.forward(input)).abs().into_scalar();

        assert!(diff < 1e-6, "hard copy should match the source, diff {diff}");
    }

    #[test]
    fn test_soft_update_interpolates() {
        let device = NdArrayDevice::default();

        let config = MLPConfig::new(3, vec![], 1);
        let source = config.init::<NdArray>(&device);
        let target = config.init::<NdArray>(&device);

        let mut half = target.clone();
        half.soft_update(&source, 0.5);

        let expected = params::flat_params(&source)
            .iter()
            .zip(params::flat_params(&target))
            .map(|(s, t)| 0.5 * s + 0.5 * t)
            .collect::<Vec<_>>();
        for (got, want) in params::flat_params(&half).iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }
}
