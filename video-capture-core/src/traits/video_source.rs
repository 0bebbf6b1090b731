use crate::models::error::CaptureError;
use crate::models::frame::Frame;

/// Interface for hardware video sources.
///
/// Implemented by:
/// - `SyntheticSource` (video-capture-sim)
/// - Future: V4L2 webcams, GigE lab cameras
///
/// The pipeline drives a source from behind the shared camera lock, so
/// implementations never see concurrent calls.
pub trait VideoSource: Send {
    /// Open the device. Called once before any read.
    fn connect(&mut self) -> Result<(), CaptureError>;

    /// Blocking hardware read of the next frame.
    ///
    /// Only invoked while the camera lock is held; a failure here is a
    /// single-frame condition, not a terminal one.
    fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Release the device. Must be idempotent.
    fn release(&mut self);

    /// `(width, height)` of delivered frames.
    fn frame_size(&self) -> (u32, u32);

    /// Native rate reported by the device, if it exposes one.
    fn native_fps(&self) -> Option<f64>;
}
