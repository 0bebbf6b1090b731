//! Synthetic video source for exercising the capture pipeline without
//! hardware.
//!
//! [`SyntheticSource`] renders a deterministic moving test pattern, so
//! integration tests can drive preview and record sessions end to end and
//! golden checks on frame content stay reproducible.

use std::thread;
use std::time::Duration;

use video_capture_core::{CaptureError, Frame, VideoSource};

/// Deterministic frame generator implementing [`VideoSource`].
///
/// Each read renders a vertical bar that advances one column per frame over
/// a gradient background; frame `n` is a pure function of `n` and the
/// configured geometry. An optional per-read delay simulates sensor
/// latency.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    read_delay: Option<Duration>,
    native_fps: Option<f64>,
    connected: bool,
    frames_generated: u64,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            read_delay: None,
            native_fps: None,
            connected: false,
            frames_generated: 0,
        }
    }

    /// Simulate sensor latency on every read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Report a native capture rate, as a real device would.
    pub fn with_native_fps(mut self, fps: f64) -> Self {
        self.native_fps = Some(fps);
        self
    }

    pub fn frames_generated(&self) -> u64 {
        self.frames_generated
    }

    /// Render frame `n` of the test pattern.
    pub fn render(&self, n: u64) -> Frame {
        let bar = (n % self.width as u64) as u32;
        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                if x == bar {
                    pixels.extend_from_slice(&[255, 255, 255]);
                } else {
                    let r = (x * 255 / self.width.max(1)) as u8;
                    let g = (y * 255 / self.height.max(1)) as u8;
                    pixels.extend_from_slice(&[r, g, (n % 256) as u8]);
                }
            }
        }
        Frame::new(pixels, self.width, self.height)
    }
}

impl VideoSource for SyntheticSource {
    fn connect(&mut self) -> Result<(), CaptureError> {
        self.connected = true;
        log::debug!("synthetic source connected ({}x{})", self.width, self.height);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.connected {
            return Err(CaptureError::DeviceUnavailable(
                "synthetic source not connected".into(),
            ));
        }
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        let frame = self.render(self.frames_generated);
        self.frames_generated += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.connected = false;
    }

    fn frame_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn native_fps(&self) -> Option<f64> {
        self.native_fps
    }
}
