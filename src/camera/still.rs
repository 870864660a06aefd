use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::camera::backend::{Frame, FrameBuffer, MediaDevice, MediaStream};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::StreamConstraints;

/// Serves a photo from disk as a one-frame live stream.
///
/// Lets the pipeline analyse an existing picture on machines without a
/// camera. Constraints are accepted but ignored; the photo is delivered at
/// its own resolution.
pub struct StillImageDevice {
    path: PathBuf,
    label: String,
}

impl StillImageDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = format!("photo:{}", path.display());
        Self { path, label }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaDevice for StillImageDevice {
    fn name(&self) -> &str {
        &self.label
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> Result<Box<dyn MediaStream>> {
        tracing::debug!(
            "opening {} (constraints ignored: {constraints:?})",
            self.path.display()
        );
        let path = self.path.clone();
        let frame = tokio::task::spawn_blocking(move || decode_frame(&path))
            .await
            .map_err(|e| CameraError::Stream(format!("decoder task failed: {e}")))??;

        let buffer = Arc::new(FrameBuffer::new(1));
        buffer.push(frame);
        Ok(Box::new(StillStream {
            buffer,
            live: AtomicBool::new(true),
        }))
    }
}

fn decode_frame(path: &Path) -> Result<Frame> {
    let rgb = image::open(path)
        .map_err(|e| match e {
            image::ImageError::IoError(_) => CameraError::DeviceNotFound(path.display().to_string()),
            other => CameraError::Stream(format!("{}: {other}", path.display())),
        })?
        .to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame {
        data: rgb.into_raw(),
        width,
        height,
        timestamp_us: 0,
    })
}

struct StillStream {
    buffer: Arc<FrameBuffer>,
    live: AtomicBool,
}

impl MediaStream for StillStream {
    fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn stop(&mut self) {
        self.live.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::types::Resolution;
    use image::{ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join("fridge.png");
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, y| Rgb([x as u8, y as u8, 200]));
        img.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn still_device_streams_the_photo_at_native_resolution() {
        let dir = TempDir::new().unwrap();
        let device = StillImageDevice::new(write_png(&dir, 40, 30));

        let mut stream = device
            .open_stream(&StreamConstraints::preferred(Resolution::new(1920, 1080)))
            .await
            .unwrap();
        let frame = stream.buffer().latest().unwrap();
        assert_eq!(frame.resolution(), Resolution::new(40, 30));
        assert_eq!(frame.data.len(), 40 * 30 * 3);
        assert_eq!(&frame.data[..3], &[0, 0, 200]);

        assert!(stream.is_live());
        stream.stop();
        assert!(!stream.is_live());
    }

    #[tokio::test]
    async fn missing_photo_is_reported_as_missing_device() {
        let dir = TempDir::new().unwrap();
        let device = StillImageDevice::new(dir.path().join("nope.jpg"));
        let result = device.open_stream(&StreamConstraints::minimal()).await;
        assert!(matches!(result, Err(CameraError::DeviceNotFound(_))));
    }

    #[tokio::test]
    async fn unreadable_photo_is_a_stream_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let device = StillImageDevice::new(path);
        let result = device.open_stream(&StreamConstraints::minimal()).await;
        assert!(matches!(result, Err(CameraError::Stream(_))));
    }

    #[test]
    fn device_name_includes_path() {
        let device = StillImageDevice::new("/tmp/dinner.jpg");
        assert_eq!(device.name(), "photo:/tmp/dinner.jpg");
        assert_eq!(device.path(), Path::new("/tmp/dinner.jpg"));
    }
}
