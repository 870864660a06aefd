use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::analysis::orchestrator::{CaptureOrchestrator, SessionState};
use crate::analysis::types::{AnalysisOutcome, AnalysisRequest};
use crate::camera::controller::MediaCaptureController;
use crate::camera::types::{CameraStatus, CapturePhase};

/// Receives each analysis outcome exactly once.
pub type OutcomeCallback = Arc<dyn Fn(&AnalysisOutcome) + Send + Sync>;

/// One scan: initialize the camera, shoot, analyse, hand the outcome to the
/// host, then return the camera to its initial lifecycle.
pub struct ScanPipeline {
    controller: Arc<MediaCaptureController>,
    orchestrator: Arc<CaptureOrchestrator>,
    deadline: Duration,
    on_outcome: OutcomeCallback,
    /// Set while a shot is being analysed; a second shot is refused.
    busy: AtomicBool,
}

impl ScanPipeline {
    pub fn new(
        controller: Arc<MediaCaptureController>,
        orchestrator: Arc<CaptureOrchestrator>,
        deadline: Duration,
        on_outcome: OutcomeCallback,
    ) -> Self {
        Self {
            controller,
            orchestrator,
            deadline,
            on_outcome,
            busy: AtomicBool::new(false),
        }
    }

    pub fn controller(&self) -> &Arc<MediaCaptureController> {
        &self.controller
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Bring the camera up. Returns the phase it settled in.
    pub async fn start(&self) -> CapturePhase {
        self.controller.initialize().await
    }

    /// Capture the current frame and analyse it.
    ///
    /// Returns `None` without starting an analysis when nothing could be
    /// captured (not streaming, or the frame is not ready) or while a
    /// previous shot is still being analysed. Otherwise the outcome is
    /// delivered to the callback once, the camera is reset and the outcome
    /// is returned.
    pub async fn shoot(&self) -> Option<AnalysisOutcome> {
        let Some(_busy) = BusyGuard::acquire(&self.busy) else {
            debug!("shot ignored: analysis already in progress");
            return None;
        };
        self.shoot_once().await
    }

    async fn shoot_once(&self) -> Option<AnalysisOutcome> {
        let still = self.controller.capture()?;
        let request = AnalysisRequest::from_still(&still);
        let outcome = self.orchestrator.analyze(request, self.deadline).await;

        (self.on_outcome)(&outcome);
        self.controller.reset();
        info!(success = outcome.is_success(), "scan finished");
        Some(outcome)
    }

    /// Discard the current photo and bring the camera back up.
    pub async fn retake(&self) -> CapturePhase {
        self.controller.reset();
        self.controller.initialize().await
    }

    /// Release the camera, e.g. when the host view goes away.
    pub fn shutdown(&self) {
        self.controller.teardown();
    }

    pub fn subscribe_camera(&self) -> watch::Receiver<CameraStatus> {
        self.controller.subscribe()
    }

    pub fn subscribe_analysis(&self) -> watch::Receiver<SessionState> {
        self.orchestrator.subscribe()
    }
}

/// Holds the pipeline's busy flag; released on drop, so a shot whose future
/// is dropped mid-analysis does not block later shots.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        (!flag.swap(true, Ordering::AcqRel)).then_some(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::error::{Result, ServiceError};
    use crate::analysis::orchestrator::Settled;
    use crate::analysis::service::AnalysisService;
    use crate::analysis::types::{AnalysisResult, Difficulty, Recipe};
    use crate::camera::controller::ControllerConfig;
    use crate::camera::dummy::{DummyBehaviour, DummyDevice};
    use crate::camera::types::Resolution;
    use crate::error::ErrorKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    /// Service that answers after a fixed delay and counts its calls.
    struct FixedService {
        delay: Duration,
        fail: bool,
        calls: AtomicUsize,
        last_image: Mutex<Vec<u8>>,
    }

    impl FixedService {
        fn new(delay: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                delay,
                fail,
                calls: AtomicUsize::new(0),
                last_image: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisService for FixedService {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn analyze(&self, image: &[u8]) -> Result<AnalysisResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_image.lock() = image.to_vec();
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(ServiceError::Transport("connection reset".to_string()));
            }
            Ok(AnalysisResult {
                ingredients: vec![],
                recipes: vec![Recipe {
                    id: "omelette".to_string(),
                    name: "番茄炒蛋".to_string(),
                    description: "家常菜".to_string(),
                    difficulty: Difficulty::Easy,
                    prep_time: "15分钟".to_string(),
                    ingredients: vec!["鸡蛋".to_string(), "番茄".to_string()],
                    instructions: vec!["打蛋".to_string(), "翻炒".to_string()],
                    calories: None,
                }],
            })
        }
    }

    struct Harness {
        device: Arc<DummyDevice>,
        service: Arc<FixedService>,
        delivered: Arc<Mutex<Vec<AnalysisOutcome>>>,
        pipeline: Arc<ScanPipeline>,
    }

    fn harness(behaviour: DummyBehaviour, delay: Duration, fail: bool) -> Harness {
        let device = Arc::new(DummyDevice::with_behaviour(behaviour));
        let controller = Arc::new(MediaCaptureController::new(
            device.clone(),
            ControllerConfig {
                target_resolution: Resolution::new(32, 24),
                jpeg_quality: 80,
                first_frame_timeout: Duration::from_millis(200),
            },
        ));
        let service = FixedService::new(delay, fail);
        let orchestrator = Arc::new(CaptureOrchestrator::new(service.clone()));
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        let pipeline = Arc::new(ScanPipeline::new(
            controller,
            orchestrator,
            Duration::from_secs(35),
            Arc::new(move |outcome: &AnalysisOutcome| sink.lock().push(outcome.clone())),
        ));
        Harness {
            device,
            service,
            delivered,
            pipeline,
        }
    }

    #[tokio::test]
    async fn shoot_before_start_does_nothing() {
        let h = harness(DummyBehaviour::default(), Duration::ZERO, false);

        assert!(h.pipeline.shoot().await.is_none());
        assert_eq!(h.service.calls(), 0);
        assert!(h.delivered.lock().is_empty());
        assert_eq!(*h.pipeline.subscribe_analysis().borrow(), SessionState::Idle);
    }

    #[tokio::test]
    async fn shoot_after_failed_start_does_nothing() {
        let h = harness(
            DummyBehaviour {
                deny_permission: true,
                ..Default::default()
            },
            Duration::ZERO,
            false,
        );

        assert_eq!(h.pipeline.start().await, CapturePhase::Failed);
        assert!(h.pipeline.shoot().await.is_none());
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn zero_sized_frame_starts_no_analysis() {
        let h = harness(
            DummyBehaviour {
                zero_sized_frames: true,
                ..Default::default()
            },
            Duration::ZERO,
            false,
        );

        assert_eq!(h.pipeline.start().await, CapturePhase::Streaming);
        assert!(h.pipeline.shoot().await.is_none());
        assert_eq!(h.service.calls(), 0);
        assert_eq!(h.pipeline.controller().phase(), CapturePhase::Streaming);
    }

    #[tokio::test]
    async fn full_scan_delivers_success_once_and_resets() {
        let h = harness(DummyBehaviour::default(), Duration::from_millis(5), false);
        assert_eq!(h.pipeline.start().await, CapturePhase::Streaming);

        let outcome = h.pipeline.shoot().await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.recipes()[0].id, "omelette");

        assert_eq!(h.service.calls(), 1);
        assert_eq!(*h.delivered.lock(), vec![outcome]);
        assert!(h.service.last_image.lock().starts_with(&[0xFF, 0xD8]));

        assert_eq!(h.pipeline.controller().phase(), CapturePhase::Uninitialized);
        assert_eq!(h.device.live_streams(), 0);
        assert_eq!(
            *h.pipeline.subscribe_analysis().borrow(),
            SessionState::Resolved(Settled::Success)
        );
    }

    #[tokio::test]
    async fn transport_failure_is_delivered_as_network_error() {
        let h = harness(DummyBehaviour::default(), Duration::ZERO, true);
        h.pipeline.start().await;

        let outcome = h.pipeline.shoot().await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::NetworkError));
        assert_eq!(h.delivered.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_service_times_out_with_single_delivery() {
        let h = harness(DummyBehaviour::default(), Duration::from_secs(40), false);
        h.pipeline.start().await;

        let outcome = h.pipeline.shoot().await.unwrap();
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::Timeout));

        // Let the detached call finish; nothing more may be delivered.
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.delivered.lock().len(), 1);
        assert_eq!(
            *h.pipeline.subscribe_analysis().borrow(),
            SessionState::Resolved(Settled::Failure(ErrorKind::Timeout))
        );
    }

    #[tokio::test]
    async fn stream_is_released_while_analysing() {
        let h = harness(DummyBehaviour::default(), Duration::from_millis(50), false);
        h.pipeline.start().await;

        let pipeline = Arc::clone(&h.pipeline);
        let shot = tokio::spawn(async move { pipeline.shoot().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(h.pipeline.controller().phase(), CapturePhase::Captured);
        assert_eq!(h.device.live_streams(), 0);
        assert!(h.pipeline.controller().still_image().is_some());

        assert!(shot.await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_shot_during_analysis_is_refused() {
        let h = harness(DummyBehaviour::default(), Duration::from_millis(50), false);
        h.pipeline.start().await;

        let pipeline = Arc::clone(&h.pipeline);
        let first = tokio::spawn(async move { pipeline.shoot().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(h.pipeline.shoot().await.is_none());
        assert!(first.await.unwrap().is_some());
        assert_eq!(h.service.calls(), 1);
        assert_eq!(h.delivered.lock().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_shot_does_not_block_the_next_one() {
        let h = harness(DummyBehaviour::default(), Duration::from_millis(200), false);
        h.pipeline.start().await;

        let gave_up = tokio::time::timeout(Duration::from_millis(20), h.pipeline.shoot()).await;
        assert!(gave_up.is_err());
        assert!(h.delivered.lock().is_empty());
        assert_eq!(*h.pipeline.subscribe_analysis().borrow(), SessionState::Idle);

        assert_eq!(h.pipeline.retake().await, CapturePhase::Streaming);
        let outcome = h.pipeline.shoot().await;
        assert!(outcome.is_some_and(|o| o.is_success()));
        assert_eq!(h.delivered.lock().len(), 1);
        assert_eq!(h.device.live_streams(), 0);
    }

    #[tokio::test]
    async fn retake_after_scan_streams_again_with_one_stream() {
        let h = harness(DummyBehaviour::default(), Duration::ZERO, false);
        h.pipeline.start().await;
        h.pipeline.shoot().await.unwrap();

        assert_eq!(h.pipeline.retake().await, CapturePhase::Streaming);
        assert_eq!(h.device.live_streams(), 1);
        assert!(h.pipeline.controller().still_image().is_none());

        let second = h.pipeline.shoot().await.unwrap();
        assert!(second.is_success());
        assert_eq!(h.delivered.lock().len(), 2);
    }

    #[tokio::test]
    async fn shutdown_releases_camera() {
        let h = harness(DummyBehaviour::default(), Duration::ZERO, false);
        h.pipeline.start().await;
        let mut camera = h.pipeline.subscribe_camera();
        assert_eq!(camera.borrow_and_update().phase, CapturePhase::Streaming);

        h.pipeline.shutdown();
        assert_eq!(h.device.live_streams(), 0);
        assert!(camera.has_changed().unwrap());
        assert_eq!(camera.borrow().phase, CapturePhase::Uninitialized);
    }
}
