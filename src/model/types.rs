use std::collections::BTreeMap;

use serde::Serialize;

/// One preprocessed image as a `(1, height, width, 3)` RGB float tensor.
pub type ImageTensor = ndarray::Array4<f32>;

/// Ordered category names. The position of a label is the index of its score
/// in the model output, so the order must match the one used at training time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabels(Vec<String>);

impl ClassLabels {
    /// Parses a comma-separated list, trimming whitespace and skipping empty
    /// entries.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(str::trim)
                .filter(|label| !label.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self::parse("glioma,meningioma,notumor,pituitary")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    pub predicted_class: String,
    pub confidence: f32,
    pub probabilities: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub name: String,
    pub dtype: String,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_skips_empty() {
        let labels = ClassLabels::parse(" glioma, meningioma ,,notumor , pituitary ");
        assert_eq!(
            labels.as_slice(),
            ["glioma", "meningioma", "notumor", "pituitary"]
        );
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(ClassLabels::parse("").is_empty());
        assert!(ClassLabels::parse(" , ,").is_empty());
    }

    #[test]
    fn test_default_order() {
        let labels = ClassLabels::default();
        assert_eq!(labels.len(), 4);
        assert_eq!(labels.get(0), Some("glioma"));
        assert_eq!(labels.get(3), Some("pituitary"));
        assert_eq!(labels.get(4), None);
    }
}
