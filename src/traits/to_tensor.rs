use burn::{
    prelude::*,
    tensor::{backend::Backend, BasicOps, Element, TensorData},
};

/// A trait for converting items to tensors
///
/// Implemented for `Vec<[E; A]>`, which turns a batch of fixed-size observations into a
/// `[batch, A]` tensor. Flat values go through [`float_tensor`] and [`index_tensor`].
pub trait ToTensor<B: Backend, const D: usize, K: BasicOps<B>> {
    fn to_tensor(self, device: &B::Device) -> Tensor<B, D, K>;
}

impl<B, E, K, const A: usize> ToTensor<B, 2, K> for Vec<[E; A]>
where
    B: Backend,
    E: Element,
    K: BasicOps<B, Elem = E>,
{
    #[inline]
    fn to_tensor(self, device: &B::Device) -> Tensor<B, 2, K> {
        let batch_size = self.len();
        let mut flat = Vec::with_capacity(batch_size * A);
        for row in self.iter() {
            flat.extend_from_slice(row);
        }
        Tensor::from_data(TensorData::new(flat, [batch_size, A]), device)
    }
}

/// Build a 1D float tensor from `f32` values, whatever the backend's float element is
pub fn float_tensor<B: Backend>(values: &[f32], device: &B::Device) -> Tensor<B, 1> {
    Tensor::from_data(TensorData::from(values).convert::<B::FloatElem>(), device)
}

/// Build a 1D int tensor of indices, whatever the backend's int element is
pub fn index_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let indices = indices.iter().map(|&i| i as i64).collect::<Vec<_>>();
    Tensor::from_data(TensorData::from(indices.as_slice()).convert::<B::IntElem>(), device)
}
