pub mod config;
pub mod error;
pub mod inference;
pub mod model;
pub mod preprocess;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use inference::InferencePipeline;
pub use model::{ModelRegistry, PredictionResponse};
pub use server::build_router;
