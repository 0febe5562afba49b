use std::{fs, path::Path, sync::Arc};

use parking_lot::Mutex;
use tch::{Device, IValue, Kind, Tensor, no_grad};

use crate::{
    error::ServiceError,
    model::{
        ImageTensor, ModelMetadata,
        loader::{ClassifierModel, ModelLoader},
    },
};

/// Loads TorchScript classification modules.
pub struct TorchModuleLoader {
    device: Device,
}

impl TorchModuleLoader {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

impl ModelLoader for TorchModuleLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn ClassifierModel>, ServiceError> {
        Ok(Arc::new(TorchModule::load(path, self.device)?))
    }
}

/// A TorchScript module served for classification.
///
/// Artifact contract: the module takes one `(1, H, W, 3)` float tensor and
/// returns `(1, num_classes)` scores with the final softmax baked into the
/// export. Traced exports that return a tuple are unwrapped to their first
/// element.
pub struct TorchModule {
    name: String,
    size_bytes: u64,
    device: Device,
    module: Mutex<tch::CModule>,
}

impl TorchModule {
    pub fn load(path: &Path, device: Device) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::ModelLoad(format!(
                "model artifact missing: {}",
                path.display()
            )));
        }
        let size_bytes = fs::metadata(path)
            .map_err(|err| {
                ServiceError::ModelLoad(format!(
                    "model artifact unreadable: {}: {err}",
                    path.display()
                ))
            })?
            .len();

        let mut module = tch::CModule::load_on_device(path, device).map_err(|err| {
            ServiceError::ModelLoad(format!(
                "model artifact did not deserialize: {}: {err}",
                path.display()
            ))
        })?;
        module.set_eval();

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        Ok(Self {
            name,
            size_bytes,
            device,
            module: Mutex::new(module),
        })
    }
}

impl ClassifierModel for TorchModule {
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&dim| dim as i64).collect();
        let flat: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_slice(&flat)
            .reshape(shape.as_slice())
            .to(self.device);

        no_grad(|| {
            let module = self.module.lock();
            let output = module
                .forward_is(&[IValue::Tensor(input_tensor)])
                .map_err(|err| ServiceError::Inference(err.to_string()))?;

            let scores = match output {
                IValue::Tensor(t) => t,
                IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                    IValue::Tensor(t) => t.shallow_clone(),
                    _ => {
                        return Err(ServiceError::Inference(
                            "expected tensor as first tuple element".into(),
                        ));
                    }
                },
                _ => {
                    return Err(ServiceError::Inference(
                        "unexpected model output format".into(),
                    ));
                }
            };

            let flat = scores.to_kind(Kind::Float).flatten(0, -1);
            Vec::<f32>::try_from(&flat).map_err(|err| ServiceError::Inference(err.to_string()))
        })
    }

    fn metadata(&self) -> ModelMetadata {
        ModelMetadata {
            name: self.name.clone(),
            dtype: "float32".to_string(),
            size_bytes: self.size_bytes,
        }
    }
}
