use crate::models::frame::Frame;

/// Receiver for frames bound for the live display.
///
/// Called from the orchestrator's event pump thread, not the UI thread.
/// Implementations should marshal to the UI thread if needed.
pub trait DisplaySink: Send + Sync {
    /// `padded` marks a duplicate inserted by drop compensation rather than
    /// a fresh hardware read.
    fn on_frame(&self, frame: &Frame, padded: bool);
}
