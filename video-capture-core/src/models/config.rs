use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one camera.
///
/// Rates are mutable at runtime through the orchestrator; a running worker
/// observes a changed rate at its next lock acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Rate at which frames are pulled from hardware (Hz).
    pub capture_fps: f64,

    /// Rate at which frames are forwarded to the live display (Hz).
    pub preview_fps: f64,

    /// Rate at which frames are persisted to the output file (Hz).
    /// Must not exceed `capture_fps`.
    pub record_fps: f64,

    /// Frame width in pixels.
    pub frame_width: u32,

    /// Frame height in pixels.
    pub frame_height: u32,

    /// JPEG quality for persisted frames, 1-100.
    pub jpeg_quality: u8,
}

impl CameraConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (label, fps) in [
            ("capture fps", self.capture_fps),
            ("preview fps", self.preview_fps),
            ("record fps", self.record_fps),
        ] {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(format!("{} must be positive, got {}", label, fps));
            }
        }
        if self.record_fps > self.capture_fps {
            return Err(format!(
                "record fps {} exceeds capture fps {}",
                self.record_fps, self.capture_fps
            ));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(format!(
                "frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            ));
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(format!("jpeg quality must be 1-100, got {}", self.jpeg_quality));
        }
        Ok(())
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.capture_fps)
    }

    pub fn preview_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.preview_fps)
    }

    /// Seconds of recorded time attributed to each persisted frame.
    pub fn record_interval_secs(&self) -> f64 {
        1.0 / self.record_fps
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            capture_fps: 30.0,
            preview_fps: 15.0,
            record_fps: 30.0,
            frame_width: 640,
            frame_height: 480,
            jpeg_quality: 85,
        }
    }
}
