//! Flat views over module parameters
//!
//! Second-order methods such as TRPO treat all of a network's weights as one vector θ. These helpers
//! walk a module with a [`ModuleMapper`], visiting float parameters in traversal order, which is
//! deterministic for a given architecture. Two modules of the same architecture therefore produce
//! vectors whose entries line up one to one.

use burn::{
    module::{AutodiffModule, Module, ModuleMapper, ParamId},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

/// Collects every float parameter into one flat vector
struct ParamCollector {
    values: Vec<f32>,
}

impl<B: Backend> ModuleMapper<B> for ParamCollector {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        self.values.extend(tensor.to_data().iter::<f32>());
        tensor
    }
}

/// Collects the gradient of every float parameter, zeros for parameters the loss does not touch
struct GradCollector<'a, B: AutodiffBackend> {
    grads: &'a B::Gradients,
    values: Vec<f32>,
}

impl<B: AutodiffBackend> ModuleMapper<B> for GradCollector<'_, B> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, tensor: Tensor<B, D>) -> Tensor<B, D> {
        match tensor.grad(self.grads) {
            Some(grad) => self.values.extend(grad.into_data().iter::<f32>()),
            None => {
                let n = tensor.shape().num_elements();
                self.values.extend(std::iter::repeat(0.0).take(n));
            }
        }
        tensor
    }
}

/// Overwrites every float parameter with consecutive slices of a flat vector
struct ParamWriter<'a> {
    values: &'a [f32],
    offset: usize,
}

impl<B: Backend> ModuleMapper<B> for ParamWriter<'_> {
    fn map_float<const D: usize>(&mut self, _id: ParamId, current: Tensor<B, D>) -> Tensor<B, D> {
        let dims = current.dims();
        let n = current.shape().num_elements();

        let slice = &self.values[self.offset..self.offset + n];
        self.offset += n;

        let tensor = Tensor::<B, 1>::from_data(TensorData::new(slice.to_vec(), [n]), &current.device())
            .reshape(dims);
        if current.is_require_grad() {
            tensor.require_grad()
        } else {
            tensor
        }
    }
}

/// Interpolates every float parameter toward the matching parameter of another module
struct SoftUpdater {
    source: Vec<f32>,
    offset: usize,
    tau: f32,
}

impl<B: Backend> ModuleMapper<B> for SoftUpdater {
    fn map_float<const D: usize>(&mut self, _id: ParamId, current: Tensor<B, D>) -> Tensor<B, D> {
        let dims = current.dims();
        let n = current.shape().num_elements();

        let target = current.clone().into_data().iter::<f32>().collect::<Vec<_>>();
        let mixed = target
            .iter()
            .zip(&self.source[self.offset..self.offset + n])
            .map(|(t, s)| self.tau * s + (1.0 - self.tau) * t)
            .collect::<Vec<_>>();
        self.offset += n;

        let tensor =
            Tensor::<B, 1>::from_data(TensorData::new(mixed, [n]), &current.device()).reshape(dims);
        if current.is_require_grad() {
            tensor.require_grad()
        } else {
            tensor
        }
    }
}

/// Total number of scalar parameters in `module`
pub fn num_params<B: Backend, M: Module<B>>(module: &M) -> usize {
    module.num_params()
}

/// All float parameters of `module`, flattened in traversal order
pub fn flat_params<B: Backend, M: Module<B>>(module: &M) -> Vec<f32> {
    let mut collector = ParamCollector { values: Vec::new() };
    let _ = module.clone().map(&mut collector);
    collector.values
}

/// Gradients of all float parameters of `module`, in the order of [`flat_params`]
pub fn flat_grads<B: AutodiffBackend, M: AutodiffModule<B>>(module: &M, grads: &B::Gradients) -> Vec<f32> {
    let mut collector = GradCollector::<B> {
        grads,
        values: Vec::new(),
    };
    let _ = module.clone().map(&mut collector);
    collector.values
}

/// Replace the float parameters of `module` with `values`, in the order of [`flat_params`]
///
/// Panics if `values` is shorter than the number of parameters.
pub fn set_flat_params<B: Backend, M: Module<B>>(module: M, values: &[f32]) -> M {
    let mut writer = ParamWriter { values, offset: 0 };
    module.map(&mut writer)
}

/// Soft update (Polyak averaging): θ_target ← τ·θ_source + (1 − τ)·θ_target
///
/// `source` and `target` must share an architecture. The new parameters are fresh leaves, so no
/// autodiff graph is carried over from `source`.
pub fn soft_update<B: Backend, M: Module<B>>(source: &M, target: M, tau: f32) -> M {
    let mut updater = SoftUpdater {
        source: flat_params(source),
        offset: 0,
        tau,
    };
    target.map(&mut updater)
}

#[cfg(test)]
mod tests {
    use burn::backend::{
        ndarray::{NdArray, NdArrayDevice},
        Autodiff,
    };

    use super::*;
    use crate::nn::MLPConfig;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn flat_params_covers_every_weight() {
        let device = NdArrayDevice::default();
        // 3*4 + 4 + 4*2 + 2
        let mlp = MLPConfig::new(3, vec![4], 2).init::<NdArray>(&device);

        let flat = flat_params(&mlp);
        assert_eq!(flat.len(), 26);
        assert_eq!(num_params(&mlp), 26);
    }

    #[test]
    fn set_then_get_returns_the_same_vector() {
        let device = NdArrayDevice::default();
        let mlp = MLPConfig::new(3, vec![4], 2).init::<NdArray>(&device);

        let values = (0..26).map(|i| i as f32 * 0.1).collect::<Vec<_>>();
        let mlp = set_flat_params(mlp, &values);

        assert_eq!(flat_params(&mlp), values);
    }

    #[test]
    fn zeroed_network_outputs_zero() {
        let device = NdArrayDevice::default();
        let mlp = MLPConfig::new(3, vec![4], 2).init::<NdArray>(&device);
        let mlp = set_flat_params(mlp, &[0.0; 26]);

        let out = mlp.forward(Tensor::<NdArray, 2>::from_floats([[1.0, 2.0, 3.0]], &device));
        let data = out.into_data();
        assert!(data.iter::<f32>().all(|v| v == 0.0));
    }

    #[test]
    fn grads_of_a_linear_map_are_the_inputs() {
        let device = NdArrayDevice::default();
        // single linear layer y = w·x + b
        let mlp = MLPConfig::new(2, vec![], 1).init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 2>::from_floats([[2.0, -3.0]], &device);
        let loss = mlp.forward(x).sum();
        let grads = loss.backward();

        let flat = flat_grads(&mlp, &grads);
        assert_eq!(flat.len(), 3);
        // weight is stored [in, out], so the gradient is x, then the bias gradient is 1
        assert!((flat[0] - 2.0).abs() < 1e-6);
        assert!((flat[1] + 3.0).abs() < 1e-6);
        assert!((flat[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn written_params_still_receive_gradients() {
        let device = NdArrayDevice::default();
        let mlp = MLPConfig::new(2, vec![], 1).init::<TestBackend>(&device);
        let mlp = set_flat_params(mlp, &[1.0, 1.0, 0.0]);

        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0]], &device);
        let grads = mlp.forward(x).sum().backward();

        assert!(flat_grads(&mlp, &grads).iter().any(|g| *g != 0.0));
    }
}
