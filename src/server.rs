use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, State},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::{
    config::AppConfig,
    error::ServiceError,
    inference::InferencePipeline,
    model::{ModelMetadata, ModelRegistry, PredictionResponse},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
    pub pipeline: Arc<InferencePipeline>,
}

#[derive(Serialize)]
struct MetadataResponse {
    model: Option<ModelMetadata>,
    model_path: String,
    labels: Vec<String>,
    input_width: u32,
    input_height: u32,
}

pub fn build_router(config: Arc<AppConfig>, registry: Arc<ModelRegistry>) -> Router {
    let pipeline = Arc::new(InferencePipeline::new(&config, registry.clone()));
    let state = AppState {
        pipeline,
        registry,
        config,
    };

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/metadata", get(metadata));

    if let Some(dir) = state.config.frontend_dir.as_ref() {
        router = router.nest_service("/frontend", ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn predict(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, ServiceError> {
    let (bytes, content_type) = read_image_field(&mut multipart).await?;

    // Decoding and the forward pass are CPU-bound; keep them off the runtime.
    let pipeline = state.pipeline.clone();
    let response = tokio::task::spawn_blocking(move || pipeline.predict(&bytes, &content_type))
        .await
        .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))??;

    Ok(Json(response))
}

async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    Json(MetadataResponse {
        model: state.registry.metadata(),
        model_path: state.registry.artifact_path().display().to_string(),
        labels: state.pipeline.labels().as_slice().to_vec(),
        input_width: state.config.img_width,
        input_height: state.config.img_height,
    })
}

async fn read_image_field(multipart: &mut Multipart) -> Result<(Bytes, String), ServiceError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ServiceError::InvalidInput(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| ServiceError::InvalidInput(format!("could not read upload: {err}")))?;
        return Ok((bytes, content_type));
    }

    Err(ServiceError::InvalidInput("missing file field".to_string()))
}
