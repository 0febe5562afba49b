use std::{path::Path, sync::Arc};

use crate::{
    error::ServiceError,
    model::{ImageTensor, ModelMetadata},
};

/// A loaded classification model. Never mutated after loading, so a single
/// instance is shared read-only across all in-flight requests.
pub trait ClassifierModel: Send + Sync {
    /// Runs one forward pass and returns one score per class label. Failures
    /// surface as `ServiceError::Inference`.
    fn forward(&self, input: &ImageTensor) -> Result<Vec<f32>, ServiceError>;

    fn metadata(&self) -> ModelMetadata;
}

/// Deserializes a model artifact from disk. The registry owns one loader;
/// tests inject stubs through `ModelRegistry::with_loader`.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn ClassifierModel>, ServiceError>;
}

#[cfg(feature = "tch-backend")]
pub fn artifact_loader(config: &crate::config::AppConfig) -> Box<dyn ModelLoader> {
    Box::new(crate::model::tch_backend::TorchModuleLoader::new(
        config.device,
    ))
}

#[cfg(not(feature = "tch-backend"))]
pub fn artifact_loader(_config: &crate::config::AppConfig) -> Box<dyn ModelLoader> {
    Box::new(UnavailableLoader)
}

#[cfg(not(feature = "tch-backend"))]
struct UnavailableLoader;

#[cfg(not(feature = "tch-backend"))]
impl ModelLoader for UnavailableLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn ClassifierModel>, ServiceError> {
        Err(ServiceError::ModelLoad(format!(
            "no model backend compiled in for {} (enable the tch-backend feature)",
            path.display()
        )))
    }
}
