use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::camera::backend::{MediaDevice, MediaStream};
use crate::camera::encode::encode_jpeg;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{
    CameraStatus, CapturePhase, Resolution, StillImage, StreamConstraints,
};
use crate::error::ErrorKind;

/// Tuning for camera acquisition and still encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Resolution asked for in the preferred request.
    pub target_resolution: Resolution,
    /// JPEG quality of captured stills (1-100).
    pub jpeg_quality: u8,
    /// How long a granted stream may take to deliver its first frame.
    pub first_frame_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            target_resolution: Resolution::new(1920, 1080),
            jpeg_quality: 85,
            first_frame_timeout: Duration::from_secs(5),
        }
    }
}

/// Mutable part of the controller: the camera session.
struct CameraSession {
    phase: CapturePhase,
    error: Option<String>,
    stream: Option<Box<dyn MediaStream>>,
    still: Option<StillImage>,
    /// Bumped whenever the session is torn down or restarted, so an
    /// acquisition that finishes late can tell it has been superseded.
    generation: u64,
}

impl CameraSession {
    fn status(&self) -> CameraStatus {
        CameraStatus {
            phase: self.phase,
            error: self.error.clone(),
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            debug!("media stream released");
        }
    }
}

/// Owns the camera: acquires and releases the stream and turns the current
/// frame into an encoded still image.
///
/// Every transition into a state that no longer needs the live feed
/// (`Captured`, teardown, reset) releases the stream, and at most one stream
/// is held at any time.
pub struct MediaCaptureController {
    device: Arc<dyn MediaDevice>,
    config: ControllerConfig,
    session: Mutex<CameraSession>,
    status_tx: watch::Sender<CameraStatus>,
}

impl MediaCaptureController {
    pub fn new(device: Arc<dyn MediaDevice>, config: ControllerConfig) -> Self {
        let (status_tx, _) = watch::channel(CameraStatus::new(CapturePhase::Uninitialized));
        Self {
            device,
            config,
            session: Mutex::new(CameraSession {
                phase: CapturePhase::Uninitialized,
                error: None,
                stream: None,
                still: None,
                generation: 0,
            }),
            status_tx,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CapturePhase {
        self.session.lock().phase
    }

    /// Current phase plus the message of a failed acquisition.
    pub fn status(&self) -> CameraStatus {
        self.session.lock().status()
    }

    /// Live status feed for the host.
    pub fn subscribe(&self) -> watch::Receiver<CameraStatus> {
        self.status_tx.subscribe()
    }

    /// The last captured still, kept for display while it is analysed.
    pub fn still_image(&self) -> Option<StillImage> {
        self.session.lock().still.clone()
    }

    /// Whether a stream is currently held.
    pub fn has_live_stream(&self) -> bool {
        self.session
            .lock()
            .stream
            .as_ref()
            .is_some_and(|s| s.is_live())
    }

    /// Acquire the camera and start streaming.
    ///
    /// No-op while `Requesting` or `Streaming`. From any other phase the
    /// previous still is dropped, any leftover stream released, and a stream
    /// requested with the preferred constraints, falling back once to
    /// minimal constraints. Failures end in `Failed` with a message for the
    /// host; retrying is up to the user.
    pub async fn initialize(&self) -> CapturePhase {
        let generation = {
            let mut session = self.session.lock();
            match session.phase {
                CapturePhase::Requesting | CapturePhase::Streaming => {
                    debug!("initialize ignored while {}", session.phase);
                    return session.phase;
                }
                _ => {}
            }
            session.release_stream();
            session.still = None;
            session.generation += 1;
            self.transition(&mut session, CapturePhase::Requesting, None);
            session.generation
        };

        // A stream granted here is owned by this call until it is stored in
        // the session. If the session moved on meanwhile, it briefly coexists
        // with the newer session's stream and is stopped below.
        let acquired = self.acquire().await;

        let mut session = self.session.lock();
        if session.generation != generation {
            // Torn down or reset while waiting on the device.
            if let Ok(mut stream) = acquired {
                stream.stop();
            }
            info!("camera acquisition superseded, stream discarded");
            return session.phase;
        }

        match acquired {
            Ok(stream) => {
                session.stream = Some(stream);
                self.transition(&mut session, CapturePhase::Streaming, None);
            }
            Err(e) => {
                warn!("camera unavailable on {}: {e}", self.device.name());
                self.transition(
                    &mut session,
                    CapturePhase::Failed,
                    Some(e.kind().user_message().to_string()),
                );
            }
        }
        session.phase
    }

    /// Take a photo of the current frame.
    ///
    /// Returns `None` unless the phase is `Streaming` and the stream has a
    /// frame with non-zero dimensions. On success the phase becomes
    /// `Captured` and the stream is stopped.
    pub fn capture(&self) -> Option<StillImage> {
        let mut session = self.session.lock();
        if session.phase != CapturePhase::Streaming {
            debug!("capture ignored while {}", session.phase);
            return None;
        }

        let frame = session.stream.as_ref()?.buffer().latest()?;
        if frame.resolution().is_empty() {
            debug!(
                "capture ignored: {} frame, device not ready ({})",
                frame.resolution(),
                ErrorKind::CaptureUnready
            );
            return None;
        }

        let jpeg = match encode_jpeg(
            &frame.data,
            frame.width,
            frame.height,
            self.config.jpeg_quality,
        ) {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("capture failed: {e}");
                return None;
            }
        };

        let still = StillImage::new(jpeg, frame.resolution());
        session.release_stream();
        session.still = Some(still.clone());
        self.transition(&mut session, CapturePhase::Captured, None);
        info!(
            "captured {} still ({} bytes)",
            still.resolution(),
            still.bytes().len()
        );
        Some(still)
    }

    /// Release the stream unconditionally.
    ///
    /// A session that was streaming or still acquiring falls back to
    /// `Uninitialized`; `Captured` and `Failed` keep their phase so the host
    /// can still show the photo or the error.
    pub fn teardown(&self) {
        let mut session = self.session.lock();
        session.release_stream();
        session.generation += 1;
        if matches!(
            session.phase,
            CapturePhase::Requesting | CapturePhase::Streaming
        ) {
            self.transition(&mut session, CapturePhase::Uninitialized, None);
        }
    }

    /// Forget the captured still and go back to `Uninitialized`, ready for
    /// another `initialize()`.
    pub fn reset(&self) {
        let mut session = self.session.lock();
        session.release_stream();
        session.still = None;
        session.generation += 1;
        self.transition(&mut session, CapturePhase::Uninitialized, None);
    }

    async fn acquire(&self) -> Result<Box<dyn MediaStream>> {
        let preferred = StreamConstraints::preferred(self.config.target_resolution);
        let mut stream = match self.device.open_stream(&preferred).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("preferred camera request rejected ({e}), retrying with minimal constraints");
                self.device
                    .open_stream(&StreamConstraints::minimal())
                    .await?
            }
        };

        let timeout = self.config.first_frame_timeout;
        if tokio::time::timeout(timeout, stream.buffer().first_frame())
            .await
            .is_err()
        {
            stream.stop();
            return Err(CameraError::AcquisitionTimeout(timeout));
        }
        Ok(stream)
    }

    fn transition(&self, session: &mut CameraSession, phase: CapturePhase, error: Option<String>) {
        if session.phase != phase {
            info!("camera {} -> {}", session.phase, phase);
        }
        session.phase = phase;
        session.error = error;
        self.status_tx.send_replace(session.status());
    }
}

impl Drop for MediaCaptureController {
    fn drop(&mut self) {
        self.session.get_mut().release_stream();
    }
}
