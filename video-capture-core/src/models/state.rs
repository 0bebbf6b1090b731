/// Per-camera pipeline state, derived from the shared previewing/recording
/// flags.
///
/// State transitions:
/// ```text
/// Idle → Previewing ↔ RecordingPreviewing ↔ Recording → Idle
///   ↘ Recording ↙
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraState {
    Idle,
    Previewing,
    Recording,
    RecordingPreviewing,
}

impl CameraState {
    pub fn from_flags(previewing: bool, recording: bool) -> Self {
        match (previewing, recording) {
            (false, false) => Self::Idle,
            (true, false) => Self::Previewing,
            (false, true) => Self::Recording,
            (true, true) => Self::RecordingPreviewing,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_previewing(&self) -> bool {
        matches!(self, Self::Previewing | Self::RecordingPreviewing)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording | Self::RecordingPreviewing)
    }
}

/// Trial lifecycle notifications sent to the metadata store collaborator
/// when recording starts and stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// Camera connected, no recording in progress.
    Waiting,
    /// Recording frames for the trial.
    Running,
    /// Recording drained and finalized successfully.
    Finished,
    /// Recording aborted (writer failure or disconnect mid-session).
    Stopped,
}
