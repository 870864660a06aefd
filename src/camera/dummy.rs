use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::camera::backend::{Frame, FrameBuffer, MediaDevice, MediaStream};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{Resolution, StreamConstraints};

const DUMMY_DEVICE_NAME: &str = "Dummy Test Camera";

/// Resolution used when the request leaves it to the device.
const DEFAULT_RESOLUTION: Resolution = Resolution::new(640, 480);

/// Roughly 30 fps.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Scripted misbehaviour for the simulated camera.
#[derive(Debug, Clone, Copy, Default)]
pub struct DummyBehaviour {
    /// Reject every request, as if the user declined the permission prompt.
    pub deny_permission: bool,
    /// Reject any request that is not minimal.
    pub reject_preferred: bool,
    /// Deliver 0x0 frames, as a device that is not warmed up yet.
    pub zero_sized_frames: bool,
    /// Grant the stream but never deliver a frame.
    pub silent: bool,
}

/// A fake camera for running without real hardware.
///
/// Streams a moving gradient at the requested resolution and keeps count of
/// how many of its streams are live, so leaks are observable.
///
/// Enable via `DUMMY_CAMERA=1` environment variable.
pub struct DummyDevice {
    behaviour: Mutex<DummyBehaviour>,
    live_streams: Arc<AtomicUsize>,
    requests: Mutex<Vec<StreamConstraints>>,
}

impl DummyDevice {
    /// Create a well-behaved dummy camera.
    pub fn new() -> Self {
        Self::with_behaviour(DummyBehaviour::default())
    }

    pub fn with_behaviour(behaviour: DummyBehaviour) -> Self {
        Self {
            behaviour: Mutex::new(behaviour),
            live_streams: Arc::new(AtomicUsize::new(0)),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Whether the dummy camera is enabled via environment variable.
    pub fn is_enabled() -> bool {
        std::env::var("DUMMY_CAMERA").is_ok_and(|v| v == "1" || v == "true")
    }

    /// Change the behaviour for subsequent requests, e.g. to grant a
    /// permission that was denied before.
    pub fn set_behaviour(&self, behaviour: DummyBehaviour) {
        *self.behaviour.lock() = behaviour;
    }

    /// Number of streams opened and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::Acquire)
    }

    /// Every constraint set requested so far, in order.
    pub fn requests(&self) -> Vec<StreamConstraints> {
        self.requests.lock().clone()
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDevice for DummyDevice {
    fn name(&self) -> &str {
        DUMMY_DEVICE_NAME
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>> {
        self.requests.lock().push(*constraints);
        let behaviour = *self.behaviour.lock();

        if behaviour.deny_permission {
            return Err(CameraError::PermissionDenied);
        }
        if behaviour.reject_preferred && !constraints.is_minimal() {
            return Err(CameraError::Overconstrained(
                "no rear camera at the requested resolution".to_string(),
            ));
        }

        let resolution = if behaviour.zero_sized_frames {
            Resolution::new(0, 0)
        } else {
            constraints.resolution.unwrap_or(DEFAULT_RESOLUTION)
        };

        self.live_streams.fetch_add(1, Ordering::AcqRel);
        Ok(Box::new(DummyStream::start(
            resolution,
            !behaviour.silent,
            Arc::clone(&self.live_streams),
        )))
    }
}

/// Live stream of the dummy camera, fed by a ticker task.
struct DummyStream {
    buffer: Arc<FrameBuffer>,
    live: Arc<AtomicBool>,
    live_streams: Arc<AtomicUsize>,
    producer: Option<JoinHandle<()>>,
}

impl DummyStream {
    fn start(resolution: Resolution, deliver: bool, live_streams: Arc<AtomicUsize>) -> Self {
        let buffer = Arc::new(FrameBuffer::new(3));
        let live = Arc::new(AtomicBool::new(true));

        let producer = deliver.then(|| {
            // First frame is there as soon as the stream is.
            buffer.push(gradient_frame(resolution, 0));

            let buffer = Arc::clone(&buffer);
            let live = Arc::clone(&live);
            tokio::spawn(async move {
                let mut tick: u64 = 1;
                let mut interval = tokio::time::interval(FRAME_INTERVAL);
                interval.tick().await;
                while live.load(Ordering::Acquire) {
                    interval.tick().await;
                    buffer.push(gradient_frame(resolution, tick));
                    tick += 1;
                }
            })
        });

        Self {
            buffer,
            live,
            live_streams,
            producer,
        }
    }
}

impl MediaStream for DummyStream {
    fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        if self.live.swap(false, Ordering::AcqRel) {
            self.live_streams.fetch_sub(1, Ordering::AcqRel);
        }
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

impl Drop for DummyStream {
    fn drop(&mut self) {
        if self.is_live() {
            tracing::warn!("dummy stream dropped while live, stopping it");
            self.stop();
        }
    }
}

/// RGB gradient whose blue channel moves with `tick`.
fn gradient_frame(resolution: Resolution, tick: u64) -> Frame {
    let Resolution { width, height } = resolution;
    let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x % 256) as u8);
            data.push((y % 256) as u8);
            data.push((tick % 256) as u8);
        }
    }
    Frame {
        data,
        width,
        height,
        timestamp_us: tick * FRAME_INTERVAL.as_micros() as u64,
    }
}
