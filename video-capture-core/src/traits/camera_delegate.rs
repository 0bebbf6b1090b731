use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{CameraState, TrialState};

/// Event delegate for camera notifications.
///
/// Replaces the signal/slot bus the GUI layer would otherwise provide.
/// All methods are called from the orchestrator or its event pump thread.
pub trait CameraDelegate: Send + Sync {
    /// Called when the camera's pipeline state changes.
    fn on_state_changed(&self, state: CameraState);

    /// Trial lifecycle notification for the metadata store collaborator.
    fn on_trial_state(&self, state: TrialState);

    /// Human-readable status line. `log` is false for high-frequency
    /// progress updates that would flood a log.
    fn on_status(&self, message: &str, log: bool);

    /// Called on non-fatal and session-fatal errors alike; fatality is
    /// conveyed by the accompanying state change.
    fn on_error(&self, error: &CaptureError);

    /// Called when a recording session drains and its file is finalized.
    fn on_recording_finished(&self, result: &RecordingResult);
}
