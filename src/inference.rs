use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{ClassLabels, ModelRegistry, PredictionResponse},
    preprocess::ImagePreprocessor,
};

/// Maps a raw score vector onto the configured labels.
///
/// Ties go to the lowest index so repeated runs on the same scores always
/// name the same class.
pub fn postprocess(
    scores: &[f32],
    labels: &ClassLabels,
) -> Result<PredictionResponse, ServiceError> {
    if scores.len() != labels.len() {
        return Err(ServiceError::Inference(format!(
            "model returned {} scores for {} labels",
            scores.len(),
            labels.len()
        )));
    }

    let mut best = 0;
    for (idx, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = idx;
        }
    }

    let Some(predicted_class) = labels.get(best) else {
        return Err(ServiceError::Inference("empty score vector".to_string()));
    };

    let probabilities: BTreeMap<String, f32> = labels
        .iter()
        .zip(scores.iter())
        .map(|(label, score)| (label.to_string(), *score))
        .collect();

    Ok(PredictionResponse {
        predicted_class: predicted_class.to_string(),
        confidence: scores[best],
        probabilities,
    })
}

/// End-to-end prediction path: decode, resize, normalize, forward, label.
pub struct InferencePipeline {
    preprocessor: ImagePreprocessor,
    labels: ClassLabels,
    registry: Arc<ModelRegistry>,
}

impl InferencePipeline {
    pub fn new(config: &AppConfig, registry: Arc<ModelRegistry>) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(
                config.img_width,
                config.img_height,
                config.resize_filter,
                config.normalization,
            ),
            labels: config.class_labels.clone(),
            registry,
        }
    }

    pub fn predict(
        &self,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<PredictionResponse, ServiceError> {
        let tensor = self.preprocessor.run(bytes, content_type)?;
        let model = self.registry.get_model()?;
        let scores = model.forward(&tensor)?;
        postprocess(&scores, &self.labels)
    }

    pub fn labels(&self) -> &ClassLabels {
        &self.labels
    }
}
