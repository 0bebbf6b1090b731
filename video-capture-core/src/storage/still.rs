use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::models::error::CaptureError;
use crate::models::frame::Frame;

/// Save a single frame as a JPEG still.
pub fn write_still_jpeg(frame: &Frame, path: &Path, quality: u8) -> Result<(), CaptureError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| CaptureError::StorageError(format!("failed to create directory: {}", e)))?;
    }
    let file = File::create(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to create still: {}", e)))?;
    let mut out = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(
            frame.pixels(),
            frame.width(),
            frame.height(),
            ExtendedColorType::Rgb8,
        )
        .map_err(|e| CaptureError::EncoderFailure(format!("jpeg encode failed: {}", e)))?;
    Ok(())
}
