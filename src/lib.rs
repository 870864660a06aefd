pub mod analysis;
pub mod camera;
pub mod config;
pub mod error;
pub mod favorites;
pub mod pipeline;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use analysis::gemini::GeminiAnalysisService;
use analysis::orchestrator::CaptureOrchestrator;
use analysis::service::AnalysisService;
use camera::backend::{MediaDevice, MediaStream};
use camera::types::StreamConstraints;
use config::AppConfig;
use favorites::kv::FileKeyValueStore;
use favorites::store::FavoritesStore;
use pipeline::{OutcomeCallback, ScanPipeline};

/// Pick the camera source.
///
/// When `DUMMY_CAMERA=1` is set, a simulated camera is used. Otherwise a
/// photo file stands in for the camera if one is given.
pub fn create_media_device(photo: Option<PathBuf>) -> Arc<dyn MediaDevice> {
    if camera::dummy::DummyDevice::is_enabled() {
        tracing::info!("using dummy camera");
        return Arc::new(camera::dummy::DummyDevice::new());
    }

    match photo {
        Some(path) => Arc::new(camera::still::StillImageDevice::new(path)),
        None => Arc::new(NullDevice),
    }
}

/// The configured remote analysis service.
pub fn create_analysis_service(config: &AppConfig) -> Arc<dyn AnalysisService> {
    Arc::new(GeminiAnalysisService::new(config.gemini_model.clone()))
}

/// Wire a controller and an orchestrator into a scan pipeline.
pub fn build_pipeline(
    config: &AppConfig,
    device: Arc<dyn MediaDevice>,
    service: Arc<dyn AnalysisService>,
    on_outcome: OutcomeCallback,
) -> ScanPipeline {
    let controller = Arc::new(camera::controller::MediaCaptureController::new(
        device,
        config.controller_config(),
    ));
    let orchestrator = Arc::new(
        CaptureOrchestrator::new(service).with_cancel_on_timeout(config.cancel_on_timeout),
    );
    ScanPipeline::new(controller, orchestrator, config.deadline, on_outcome)
}

/// Favorites persisted in the configured file, with the debounced save
/// task already running. Must be called inside a tokio runtime.
pub fn open_favorites(config: &AppConfig) -> Arc<FavoritesStore> {
    let store = Arc::new(FavoritesStore::new(Arc::new(FileKeyValueStore::new(
        config.favorites_path.clone(),
    ))));
    store.start_debounce_task();
    store
}

/// Device used when no camera source is available.
struct NullDevice;

#[async_trait]
impl MediaDevice for NullDevice {
    fn name(&self) -> &str {
        "none"
    }

    async fn open_stream(
        &self,
        _constraints: &StreamConstraints,
    ) -> camera::error::Result<Box<dyn MediaStream>> {
        Err(camera::error::CameraError::NoDevice)
    }
}
