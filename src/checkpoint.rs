//! Saving and loading network weights with burn's binary file recorder

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    module::Module,
    record::{BinFileRecorder, FullPrecisionSettings},
    tensor::backend::Backend,
};
use tracing::info;

use crate::error::{Result, RlError};

/// Write `module` to `<dir>/<name>.bin`, creating `dir` if needed
///
/// Returns the path the recorder was given (without the `.bin` extension it appends).
pub fn save_module<B: Backend, M: Module<B>>(module: &M, dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);

    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    module
        .clone()
        .save_file(&path, &recorder)
        .map_err(|e| RlError::Recorder(e.to_string()))?;

    info!(path = %path.display(), "Saved module");
    Ok(path)
}

/// Load weights saved by [`save_module`] into `module`
pub fn load_module<B: Backend, M: Module<B>>(
    module: M,
    dir: &Path,
    name: &str,
    device: &B::Device,
) -> Result<M> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    module
        .load_file(dir.join(name), &recorder, device)
        .map_err(|e| RlError::Recorder(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{params, MLPConfig, MLP};
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_save_then_load_restores_weights() {
        let device = NdArrayDevice::default();
        let dir = std::env::temp_dir().join(format!("rlexp-checkpoint-{}", std::process::id()));

        let saved: MLP<NdArray> = MLPConfig::new(4, vec![8], 2).init(&device);
        save_module(&saved, &dir, "net").unwrap();
        assert!(dir.join("net.bin").exists());

        let fresh: MLP<NdArray> = MLPConfig::new(4, vec![8], 2).init(&device);
        assert_ne!(params::flat_params(&saved), params::flat_params(&fresh));

        let loaded = load_module(fresh, &dir, "net", &device).unwrap();
        assert_eq!(params::flat_params(&saved), params::flat_params(&loaded));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file_is_recorder_error() {
        let device = NdArrayDevice::default();
        let module: MLP<NdArray> = MLPConfig::new(2, vec![], 1).init(&device);
        let dir = std::env::temp_dir().join("rlexp-checkpoint-missing");

        let result = load_module(module, &dir, "absent", &device);
        assert!(matches!(result, Err(RlError::Recorder(_))));
    }
}
