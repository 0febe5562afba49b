use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::OnceCell;
use tracing::info;

use crate::{
    config::AppConfig,
    error::ServiceError,
    model::{
        ModelMetadata,
        loader::{self, ClassifierModel, ModelLoader},
    },
};

/// Owns the process-wide model instance.
///
/// The artifact is loaded at most once: concurrent first callers block on a
/// single load, and a failed load caches nothing, so the next call retries.
pub struct ModelRegistry {
    artifact_path: PathBuf,
    loader: Box<dyn ModelLoader>,
    model: OnceCell<Arc<dyn ClassifierModel>>,
}

impl ModelRegistry {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_loader(config.model_path.clone(), loader::artifact_loader(config))
    }

    pub fn with_loader(artifact_path: PathBuf, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            artifact_path,
            loader,
            model: OnceCell::new(),
        }
    }

    pub fn get_model(&self) -> Result<Arc<dyn ClassifierModel>, ServiceError> {
        self.model
            .get_or_try_init(|| {
                info!(path = %self.artifact_path.display(), "loading model artifact");
                let model = self.loader.load(&self.artifact_path)?;
                info!(path = %self.artifact_path.display(), "model artifact loaded");
                Ok(model)
            })
            .cloned()
    }

    /// Loads the model eagerly so the first request does not pay for it.
    pub fn warm_up(&self) -> Result<(), ServiceError> {
        self.get_model().map(|_| ())
    }

    pub fn is_loaded(&self) -> bool {
        self.model.get().is_some()
    }

    pub fn metadata(&self) -> Option<ModelMetadata> {
        self.model.get().map(|model| model.metadata())
    }

    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageTensor;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct StubModel(Vec<f32>);

    impl ClassifierModel for StubModel {
        fn forward(&self, _input: &ImageTensor) -> Result<Vec<f32>, ServiceError> {
            Ok(self.0.clone())
        }

        fn metadata(&self) -> ModelMetadata {
            ModelMetadata {
                name: "stub".to_string(),
                dtype: "float32".to_string(),
                size_bytes: 0,
            }
        }
    }

    struct CountingLoader {
        loads: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl ModelLoader for CountingLoader {
        fn load(&self, _path: &Path) -> Result<Arc<dyn ClassifierModel>, ServiceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            Ok(Arc::new(StubModel(vec![1.0, 0.0])))
        }
    }

    struct FileBackedLoader {
        loads: Arc<AtomicUsize>,
    }

    impl ModelLoader for FileBackedLoader {
        fn load(&self, path: &Path) -> Result<Arc<dyn ClassifierModel>, ServiceError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if !path.exists() {
                return Err(ServiceError::ModelLoad(format!(
                    "model artifact missing: {}",
                    path.display()
                )));
            }
            Ok(Arc::new(StubModel(vec![0.5, 0.5])))
        }
    }

    #[test]
    fn test_concurrent_first_calls_load_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = ModelRegistry::with_loader(
            PathBuf::from("unused.pt"),
            Box::new(CountingLoader {
                loads: loads.clone(),
                delay: Duration::from_millis(50),
            }),
        );

        let workers = 8;
        let barrier = Barrier::new(workers);
        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| {
                    barrier.wait();
                    assert!(registry.get_model().is_ok());
                });
            }
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(registry.is_loaded());
    }

    #[test]
    fn test_repeat_calls_share_the_cached_handle() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = ModelRegistry::with_loader(
            PathBuf::from("unused.pt"),
            Box::new(CountingLoader {
                loads: loads.clone(),
                delay: Duration::ZERO,
            }),
        );

        let first = registry.get_model().unwrap();
        let second = registry.get_model().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_failure_caches_nothing_and_retries() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("model.pt");
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = ModelRegistry::with_loader(
            artifact.clone(),
            Box::new(FileBackedLoader {
                loads: loads.clone(),
            }),
        );

        // Every failing call must hit the loader again; nothing is cached.
        for _ in 0..2 {
            let err = registry.get_model().map(|_| ()).unwrap_err();
            assert!(matches!(err, ServiceError::ModelLoad(_)));
            assert!(!registry.is_loaded());
            assert!(registry.metadata().is_none());
        }
        assert_eq!(loads.load(Ordering::SeqCst), 2);

        // Operator drops the artifact in place; the next call must succeed.
        std::fs::write(&artifact, b"weights").unwrap();
        assert!(registry.get_model().is_ok());
        assert!(registry.is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_metadata_available_after_load() {
        let registry = ModelRegistry::with_loader(
            PathBuf::from("unused.pt"),
            Box::new(CountingLoader {
                loads: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }),
        );

        assert!(registry.metadata().is_none());
        registry.warm_up().unwrap();
        let metadata = registry.metadata().unwrap();
        assert_eq!(metadata.name, "stub");
    }
}
