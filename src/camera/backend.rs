use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::camera::error::Result;
use crate::camera::types::{Resolution, StreamConstraints};

/// A single frame delivered by a live stream.
pub struct Frame {
    /// Raw pixel data (RGB).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
}

impl Frame {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Thread-safe ring buffer for stream frames.
///
/// Stores up to `capacity` frames, overwriting the oldest when full.
/// Frames are wrapped in `Arc` so the capture path gets a cheap
/// reference-counted pointer instead of cloning the pixel buffer.
pub struct FrameBuffer {
    frames: Mutex<Vec<Option<Arc<Frame>>>>,
    capacity: usize,
    write_idx: Mutex<usize>,
    /// Monotonic counter incremented on each push.
    sequence: AtomicU64,
    arrived: Notify,
}

impl FrameBuffer {
    /// Create a new ring buffer with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let frames = (0..capacity).map(|_| None).collect();
        Self {
            frames: Mutex::new(frames),
            capacity,
            write_idx: Mutex::new(0),
            sequence: AtomicU64::new(0),
            arrived: Notify::new(),
        }
    }

    /// Push a new frame into the buffer, overwriting the oldest if full.
    pub fn push(&self, frame: Frame) {
        if self.capacity == 0 {
            return;
        }
        {
            let mut frames = self.frames.lock();
            let mut idx = self.write_idx.lock();
            frames[*idx] = Some(Arc::new(frame));
            *idx = (*idx + 1) % self.capacity;
        }
        self.sequence.fetch_add(1, Ordering::Release);
        self.arrived.notify_waiters();
    }

    /// Number of frames pushed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Get the most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let frames = self.frames.lock();
        let idx = self.write_idx.lock();
        if self.capacity == 0 {
            return None;
        }
        let latest_idx = if *idx == 0 {
            self.capacity - 1
        } else {
            *idx - 1
        };
        frames[latest_idx].clone()
    }

    /// Resolve once at least one frame has been pushed.
    pub async fn first_frame(&self) {
        loop {
            // Register before checking so a push in between is not missed.
            let notified = self.arrived.notified();
            if self.sequence() > 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Source of live video streams (a camera, a simulated device, a photo file).
///
/// `open_stream` resolves once the platform has granted access and a stream
/// handle exists; the first frame may still be in flight.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Short device label for logs.
    fn name(&self) -> &str;

    /// Request a video-only stream satisfying `constraints`.
    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>>;
}

/// A live acquisition. Tracks keep the device busy until `stop()` is called;
/// dropping the handle is not a release.
pub trait MediaStream: Send + Sync {
    /// Frames produced by this stream.
    fn buffer(&self) -> &Arc<FrameBuffer>;

    /// Whether any track is still running.
    fn is_live(&self) -> bool;

    /// Stop all tracks. Idempotent.
    fn stop(&mut self);
}
