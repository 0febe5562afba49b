use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use anyhow::{Context, ensure};
use image::imageops::FilterType;

#[cfg(feature = "tch-backend")]
use tch::Device;

use crate::model::ClassLabels;
use crate::preprocess::{Normalization, resize_filter_from_name};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub model_path: PathBuf,
    pub class_labels: ClassLabels,
    pub img_width: u32,
    pub img_height: u32,
    pub normalization: Normalization,
    pub resize_filter: FilterType,
    pub frontend_dir: Option<PathBuf>,
    #[cfg(feature = "tch-backend")]
    pub device: Device,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let listen_addr = env::var("SERVER_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8000".into())
            .parse()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000));

        let model_path = PathBuf::from(
            env::var("MODEL_PATH").unwrap_or_else(|_| "models/brain_tumor.pt".to_string()),
        );

        let class_labels = ClassLabels::parse(
            &env::var("CLASS_LABELS")
                .unwrap_or_else(|_| "glioma,meningioma,notumor,pituitary".to_string()),
        );
        ensure!(!class_labels.is_empty(), "CLASS_LABELS must name at least one class");

        let img_width = env::var("IMG_WIDTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(224);
        let img_height = env::var("IMG_HEIGHT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(224);
        ensure!(img_width > 0 && img_height > 0, "IMG_WIDTH and IMG_HEIGHT must be positive");

        let norm_name = env::var("PIXEL_NORM").unwrap_or_else(|_| "imagenet".to_string());
        let normalization = Normalization::from_name(&norm_name)
            .with_context(|| format!("unknown PIXEL_NORM preset: {norm_name}"))?;

        let filter_name = env::var("RESIZE_FILTER").unwrap_or_else(|_| "catmullrom".to_string());
        let resize_filter = resize_filter_from_name(&filter_name)
            .with_context(|| format!("unknown RESIZE_FILTER: {filter_name}"))?;

        let frontend_dir = env::var("FRONTEND_DIR").ok().map(PathBuf::from);

        #[cfg(feature = "tch-backend")]
        let device = {
            let raw = env::var("DEVICE").unwrap_or_else(|_| "cpu".into());
            parse_device(&raw)
        };

        Ok(Self {
            listen_addr,
            model_path,
            class_labels,
            img_width,
            img_height,
            normalization,
            resize_filter,
            frontend_dir,
            #[cfg(feature = "tch-backend")]
            device,
        })
    }
}

#[cfg(feature = "tch-backend")]
fn parse_device(raw: &str) -> Device {
    let lower = raw.to_lowercase();
    if lower == "cpu" {
        Device::Cpu
    } else if lower.starts_with("cuda") {
        let idx = lower
            .split(':')
            .nth(1)
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);
        if tch::Cuda::is_available() {
            Device::Cuda(idx)
        } else {
            Device::Cpu
        }
    } else {
        Device::Cpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        // set_var is process-global and racy across test threads, so only
        // the default path is covered here.
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.img_width, 224);
        assert_eq!(config.img_height, 224);
        assert_eq!(config.class_labels.len(), 4);
        assert_eq!(config.normalization, Normalization::imagenet());
        assert_eq!(config.resize_filter, FilterType::CatmullRom);
        assert_eq!(config.model_path, PathBuf::from("models/brain_tumor.pt"));
    }
}
