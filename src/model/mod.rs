mod loader;
mod registry;
mod types;

#[cfg(feature = "tch-backend")]
pub mod tch_backend;

pub use loader::{ClassifierModel, ModelLoader};
pub use registry::ModelRegistry;
pub use types::{ClassLabels, ImageTensor, ModelMetadata, PredictionResponse};
