pub mod to_tensor;
pub mod trainable;

pub use to_tensor::{float_tensor, index_tensor, ToTensor};
pub use trainable::{StepInfo, TrainableAgent, TrainingMetrics};
