use image::codecs::jpeg::JpegEncoder;
use image::{ImageBuffer, Rgb};

use crate::camera::error::{CameraError, Result};

/// Encode raw RGB pixel data to JPEG at the given quality (1-100).
pub fn encode_jpeg(data: &[u8], width: u32, height: u32, quality: u8) -> Result<Vec<u8>> {
    let img: ImageBuffer<Rgb<u8>, _> = ImageBuffer::from_raw(width, height, data)
        .ok_or_else(|| {
            CameraError::Encode(format!(
                "buffer of {} bytes does not hold a {width}x{height} RGB frame",
                data.len()
            ))
        })?;

    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    img.write_with_encoder(encoder)
        .map_err(|e| CameraError::Encode(e.to_string()))?;
    Ok(buf)
}
