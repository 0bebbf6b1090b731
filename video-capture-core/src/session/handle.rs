use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::models::config::CameraConfig;
use crate::models::error::CaptureError;
use crate::models::frame::Frame;
use crate::traits::video_source::VideoSource;

/// Plain shared state guarded by the camera mutex.
///
/// Per-cadence intervals are recomputed whenever the corresponding fps
/// changes; a worker adopts the new interval at its next lock acquisition.
#[derive(Debug)]
struct SharedState {
    connected: bool,
    previewing: bool,
    recording: bool,
    writing: bool,
    reader_active: bool,
    capture_fps: f64,
    capture_interval: Duration,
    preview_fps: f64,
    preview_interval: Duration,
    record_fps: f64,
    last_frame: Option<Frame>,
}

/// The device plus every field mutated across threads. Access only through
/// `SharedCameraHandle::lock`.
pub struct CameraInner {
    source: Box<dyn VideoSource>,
    state: SharedState,
}

impl CameraInner {
    pub fn connect(&mut self) -> Result<(), CaptureError> {
        if self.state.connected {
            return Ok(());
        }
        self.source.connect()?;
        self.state.connected = true;
        Ok(())
    }

    /// Release the device. Guarded by the connected flag so the hardware is
    /// released exactly once no matter how many stop paths run.
    pub fn release(&mut self) {
        if self.state.connected {
            self.source.release();
            self.state.connected = false;
            self.state.last_frame = None;
        }
    }

    /// The one blocking hardware read. Caches the frame for the preview
    /// path before returning it.
    pub fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.state.connected {
            return Err(CaptureError::DeviceUnavailable("not connected".into()));
        }
        let frame = self.source.read_frame()?;
        self.state.last_frame = Some(frame.clone());
        Ok(frame)
    }

    /// Most recent frame read by anyone holding the lock.
    pub fn last_frame(&self) -> Option<Frame> {
        self.state.last_frame.clone()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.source.frame_size()
    }

    pub fn native_fps(&self) -> Option<f64> {
        self.source.native_fps()
    }

    pub fn connected(&self) -> bool {
        self.state.connected
    }

    pub fn previewing(&self) -> bool {
        self.state.previewing
    }

    pub fn set_previewing(&mut self, on: bool) {
        self.state.previewing = on;
    }

    pub fn recording(&self) -> bool {
        self.state.recording
    }

    pub fn set_recording(&mut self, on: bool) {
        self.state.recording = on;
    }

    pub fn writing(&self) -> bool {
        self.state.writing
    }

    pub fn set_writing(&mut self, on: bool) {
        self.state.writing = on;
    }

    pub fn reader_active(&self) -> bool {
        self.state.reader_active
    }

    pub fn set_reader_active(&mut self, on: bool) {
        self.state.reader_active = on;
    }

    /// Whether the reader should keep ticking.
    pub fn keep_reading(&self) -> bool {
        self.state.previewing || self.state.recording
    }

    pub fn capture_fps(&self) -> f64 {
        self.state.capture_fps
    }

    pub fn capture_interval(&self) -> Duration {
        self.state.capture_interval
    }

    pub fn set_capture_fps(&mut self, fps: f64) -> Result<(), CaptureError> {
        validate_fps(fps)?;
        self.state.capture_fps = fps;
        self.state.capture_interval = Duration::from_secs_f64(1.0 / fps);
        Ok(())
    }

    pub fn preview_fps(&self) -> f64 {
        self.state.preview_fps
    }

    pub fn preview_interval(&self) -> Duration {
        self.state.preview_interval
    }

    pub fn set_preview_fps(&mut self, fps: f64) -> Result<(), CaptureError> {
        validate_fps(fps)?;
        self.state.preview_fps = fps;
        self.state.preview_interval = Duration::from_secs_f64(1.0 / fps);
        Ok(())
    }

    pub fn record_fps(&self) -> f64 {
        self.state.record_fps
    }

    pub fn set_record_fps(&mut self, fps: f64) -> Result<(), CaptureError> {
        validate_fps(fps)?;
        self.state.record_fps = fps;
        Ok(())
    }
}

fn validate_fps(fps: f64) -> Result<(), CaptureError> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(CaptureError::ConfigurationError(format!(
            "fps must be positive, got {}",
            fps
        )));
    }
    Ok(())
}

/// Shared handle to one camera: the native device and all cross-thread
/// state behind a single `parking_lot::Mutex`.
///
/// Cloning the handle clones the `Arc`; every worker holds one and takes
/// the lock once per tick.
#[derive(Clone)]
pub struct SharedCameraHandle {
    inner: Arc<Mutex<CameraInner>>,
}

impl SharedCameraHandle {
    pub fn new(source: Box<dyn VideoSource>, config: &CameraConfig) -> Self {
        let inner = CameraInner {
            source,
            state: SharedState {
                connected: false,
                previewing: false,
                recording: false,
                writing: false,
                reader_active: false,
                capture_fps: config.capture_fps,
                capture_interval: config.capture_interval(),
                preview_fps: config.preview_fps,
                preview_interval: config.preview_interval(),
                record_fps: config.record_fps,
                last_frame: None,
            },
        };
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Scoped acquisition of the camera lock.
    pub fn lock(&self) -> MutexGuard<'_, CameraInner> {
        self.inner.lock()
    }
}
