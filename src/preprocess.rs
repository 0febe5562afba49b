use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::{error::ServiceError, model::ImageTensor};

/// Per-channel affine pixel transform, stored in the folded form
/// `value * alpha[c] + beta[c]` with `alpha = scale / std` and
/// `beta = -mean / std`.
///
/// The preset must reproduce the arithmetic used when the served model was
/// trained; a mismatched transform degrades predictions without any error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    alpha: [f32; 3],
    beta: [f32; 3],
}

impl Normalization {
    pub fn affine(scale: f32, mean: [f32; 3], std: [f32; 3]) -> Self {
        let mut alpha = [0.0f32; 3];
        let mut beta = [0.0f32; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Self { alpha, beta }
    }

    /// ImageNet statistics after 1/255 scaling; the transform the
    /// EfficientNet model family is trained with.
    pub fn imagenet() -> Self {
        Self::affine(1.0 / 255.0, [0.485, 0.456, 0.406], [0.229, 0.224, 0.225])
    }

    /// Plain 1/255 scaling into [0, 1].
    pub fn unit() -> Self {
        Self::affine(1.0 / 255.0, [0.0; 3], [1.0; 3])
    }

    /// Maps [0, 255] onto [-1, 1].
    pub fn symmetric() -> Self {
        Self::affine(2.0 / 255.0, [1.0; 3], [1.0; 3])
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "imagenet" => Some(Self::imagenet()),
            "unit" => Some(Self::unit()),
            "symmetric" => Some(Self::symmetric()),
            _ => None,
        }
    }

    /// Normalizes an RGB image into a `(1, height, width, 3)` float tensor.
    pub fn apply(&self, rgb: &RgbImage) -> Result<ImageTensor, ServiceError> {
        let (width, height) = rgb.dimensions();
        // RgbImage raw storage is already interleaved HWC, so channel index
        // is position modulo 3.
        let data: Vec<f32> = rgb
            .as_raw()
            .iter()
            .enumerate()
            .map(|(i, &v)| f32::from(v) * self.alpha[i % 3] + self.beta[i % 3])
            .collect();

        ImageTensor::from_shape_vec((1, height as usize, width as usize, 3), data)
            .map_err(|err| ServiceError::Inference(format!("image tensor shape: {err}")))
    }
}

pub fn resize_filter_from_name(name: &str) -> Option<FilterType> {
    match name {
        "nearest" => Some(FilterType::Nearest),
        "triangle" => Some(FilterType::Triangle),
        "catmullrom" => Some(FilterType::CatmullRom),
        "gaussian" => Some(FilterType::Gaussian),
        "lanczos3" => Some(FilterType::Lanczos3),
        _ => None,
    }
}

/// Turns an uploaded image into the fixed-shape tensor the model expects:
/// decode, force RGB, resize to the configured dimensions with the pinned
/// filter, normalize, add the batch dimension.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    width: u32,
    height: u32,
    filter: FilterType,
    normalization: Normalization,
}

impl ImagePreprocessor {
    pub fn new(width: u32, height: u32, filter: FilterType, normalization: Normalization) -> Self {
        Self {
            width,
            height,
            filter,
            normalization,
        }
    }

    pub fn run(&self, bytes: &[u8], content_type: &str) -> Result<ImageTensor, ServiceError> {
        if !content_type.starts_with("image/") {
            return Err(ServiceError::InvalidInput("file must be an image".into()));
        }

        let decoded = image::load_from_memory(bytes)
            .map_err(|_| ServiceError::InvalidInput("could not read image".into()))?;

        // to_rgb8 drops alpha and promotes grayscale, resize always hits the
        // exact target dimensions regardless of the source aspect ratio.
        let rgb = decoded.to_rgb8();
        let resized = imageops::resize(&rgb, self.width, self.height, self.filter);

        self.normalization.apply(&resized)
    }
}
