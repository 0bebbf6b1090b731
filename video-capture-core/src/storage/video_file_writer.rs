use std::fs::{self, File};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use sha2::{Digest, Sha256};

use crate::models::error::CaptureError;
use crate::models::frame::Frame;
use crate::storage::avi_format::{self, IndexEntry};

/// Streaming MJPEG/AVI container writer.
///
/// Owned exclusively by the frame writer thread; nothing else touches the
/// encoder or the file handle. Frames are JPEG-compressed and appended as
/// `00dc` chunks; `close` writes the index and patches the RIFF sizes and
/// frame counts recorded as placeholders by `open`.
pub struct VideoFileWriter {
    file_path: PathBuf,
    file: Option<File>,
    width: u32,
    height: u32,
    fps: f64,
    jpeg_quality: u8,
    index: Vec<IndexEntry>,
    /// Running offset within the movi list, measured from the `movi` fourcc.
    movi_offset: u32,
    total_bytes_written: u64,
    is_open: bool,
}

impl VideoFileWriter {
    pub fn new(file_path: PathBuf, width: u32, height: u32, fps: f64, jpeg_quality: u8) -> Self {
        Self {
            file_path,
            file: None,
            width,
            height,
            fps,
            jpeg_quality,
            index: Vec::new(),
            movi_offset: avi_format::FIRST_CHUNK_INDEX_OFFSET,
            total_bytes_written: 0,
            is_open: false,
        }
    }

    /// Create the file and write the header block with placeholder counts.
    pub fn open(&mut self) -> Result<(), CaptureError> {
        if self.is_open {
            return Ok(());
        }

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| CaptureError::EncoderFailure(format!("failed to create directory: {}", e)))?;
        }

        let file = File::create(&self.file_path)
            .map_err(|e| CaptureError::EncoderFailure(format!("failed to create file: {}", e)))?;
        self.file = Some(file);

        let header = avi_format::generate_avi_header(self.width, self.height, self.fps);
        self.write_raw(&header)?;
        self.is_open = true;
        Ok(())
    }

    /// Compress `frame` to JPEG and append it as a `00dc` chunk.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), CaptureError> {
        if !self.is_open {
            return Err(CaptureError::EncoderFailure("container is not open".into()));
        }
        if frame.width() != self.width || frame.height() != self.height {
            return Err(CaptureError::EncoderFailure(format!(
                "frame size {}x{} does not match container {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode(frame.pixels(), self.width, self.height, ExtendedColorType::Rgb8)
            .map_err(|e| CaptureError::EncoderFailure(format!("jpeg encode failed: {}", e)))?;

        let size = jpeg.len() as u32;
        self.write_raw(&avi_format::frame_chunk_header(size))?;
        self.write_raw(&jpeg)?;
        if size & 1 == 1 {
            self.write_raw(&[0u8])?;
        }

        self.index.push(IndexEntry {
            offset: self.movi_offset,
            size,
        });
        self.movi_offset += avi_format::chunk_span(size);
        Ok(())
    }

    /// Write the index, patch header sizes and counts, flush, and return the
    /// SHA-256 hex digest of the finished file.
    pub fn close(&mut self) -> Result<String, CaptureError> {
        if !self.is_open {
            return Err(CaptureError::EncoderFailure("container is not open".into()));
        }

        let index = avi_format::generate_index(&self.index);
        self.write_raw(&index)?;

        let total_frames = self.index.len() as u32;
        // movi list size: the fourcc plus every chunk span.
        let movi_size = self.movi_offset;
        let riff_size = (self.total_bytes_written - 8) as u32;

        let file = self.file.as_mut().ok_or_else(storage_closed)?;
        for (offset, value) in [
            (avi_format::RIFF_SIZE_OFFSET, riff_size),
            (avi_format::TOTAL_FRAMES_OFFSET, total_frames),
            (avi_format::STREAM_LENGTH_OFFSET, total_frames),
            (avi_format::MOVI_SIZE_OFFSET, movi_size),
        ] {
            file.seek(SeekFrom::Start(offset))
                .map_err(|e| CaptureError::EncoderFailure(e.to_string()))?;
            file.write_all(&value.to_le_bytes())
                .map_err(|e| CaptureError::EncoderFailure(e.to_string()))?;
        }

        file.flush()
            .map_err(|e| CaptureError::EncoderFailure(e.to_string()))?;
        self.file = None;
        self.is_open = false;

        sha256_file(&self.file_path)
    }

    /// Drop the file handle without finalizing. Used on the failure path;
    /// the partial file is left on disk for inspection.
    pub fn abort(&mut self) {
        if self.is_open {
            log::warn!(
                "aborting container {} after {} frames",
                self.file_path.display(),
                self.index.len()
            );
        }
        self.file = None;
        self.is_open = false;
    }

    pub fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    fn write_raw(&mut self, data: &[u8]) -> Result<(), CaptureError> {
        let file = self.file.as_mut().ok_or_else(storage_closed)?;
        file.write_all(data)
            .map_err(|e| CaptureError::EncoderFailure(format!("write failed: {}", e)))?;
        self.total_bytes_written += data.len() as u64;
        Ok(())
    }
}

fn storage_closed() -> CaptureError {
    CaptureError::EncoderFailure("file is not open".into())
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, CaptureError> {
    let data = fs::read(path)
        .map_err(|e| CaptureError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::avi_format::AVI_HEADER_SIZE;

    fn temp_file_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("video_capture_test_{}", name))
    }

    fn gray_frame(width: u32, height: u32, level: u8) -> Frame {
        Frame::new(vec![level; (width * height * 3) as usize], width, height)
    }

    fn read_u32(buf: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
    }

    #[test]
    fn write_and_close_finalizes_counts() {
        let path = temp_file_path("three_frames.avi");
        let mut writer = VideoFileWriter::new(path.clone(), 16, 16, 10.0, 85);
        writer.open().unwrap();

        for level in [0u8, 128, 255] {
            writer.write_frame(&gray_frame(16, 16, level)).unwrap();
        }
        assert_eq!(writer.frames_written(), 3);

        let checksum = writer.close().unwrap();
        assert_eq!(checksum.len(), 64);

        let data = fs::read(&path).unwrap();
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(&data[8..12], b"AVI ");
        assert_eq!(read_u32(&data, TOTAL_FRAMES as usize), 3);
        assert_eq!(read_u32(&data, LENGTH as usize), 3);
        assert_eq!(read_u32(&data, RIFF_SIZE as usize) as usize, data.len() - 8);

        // first chunk directly after the header block
        assert_eq!(&data[AVI_HEADER_SIZE..AVI_HEADER_SIZE + 4], b"00dc");
        // movi size consistent with where idx1 begins
        let movi_size = read_u32(&data, MOVI_SIZE as usize) as usize;
        let idx_start = 212 + 8 + movi_size;
        assert_eq!(&data[idx_start..idx_start + 4], b"idx1");
        assert_eq!(read_u32(&data, idx_start + 4), 3 * 16);

        fs::remove_file(&path).ok();
    }

    const RIFF_SIZE: u64 = avi_format::RIFF_SIZE_OFFSET;
    const TOTAL_FRAMES: u64 = avi_format::TOTAL_FRAMES_OFFSET;
    const LENGTH: u64 = avi_format::STREAM_LENGTH_OFFSET;
    const MOVI_SIZE: u64 = avi_format::MOVI_SIZE_OFFSET;

    #[test]
    fn rejects_mismatched_frame_size() {
        let path = temp_file_path("mismatch.avi");
        let mut writer = VideoFileWriter::new(path.clone(), 16, 16, 10.0, 85);
        writer.open().unwrap();

        let result = writer.write_frame(&gray_frame(8, 8, 0));
        assert!(matches!(result, Err(CaptureError::EncoderFailure(_))));

        writer.abort();
        fs::remove_file(&path).ok();
    }

    #[test]
    fn write_before_open_fails() {
        let mut writer = VideoFileWriter::new(temp_file_path("unopened.avi"), 16, 16, 10.0, 85);
        assert!(writer.write_frame(&gray_frame(16, 16, 0)).is_err());
    }

    #[test]
    fn abort_leaves_partial_file() {
        let path = temp_file_path("aborted.avi");
        let mut writer = VideoFileWriter::new(path.clone(), 16, 16, 10.0, 85);
        writer.open().unwrap();
        writer.write_frame(&gray_frame(16, 16, 50)).unwrap();
        writer.abort();

        let data = fs::read(&path).unwrap();
        // header written, sizes never patched
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(read_u32(&data, RIFF_SIZE as usize), 0);

        fs::remove_file(&path).ok();
    }
}
