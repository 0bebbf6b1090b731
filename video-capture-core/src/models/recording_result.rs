use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Trial bookkeeping identifiers supplied by the metadata store collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrialLabels {
    pub box_id: Option<String>,
    pub animal_id: Option<String>,
}

/// Result returned when a recording session drains and finalizes.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingResult {
    pub file_path: PathBuf,
    /// Recorded media duration in seconds (writer's recorded-time
    /// accumulator at close).
    pub duration_secs: f64,
    pub frames_written: u64,
    /// Dequeued entries not persisted by rate downsampling or overshoot skip.
    pub frames_skipped: u64,
    /// SHA-256 hex digest of the finalized file.
    pub checksum: String,
    pub frame_width: u32,
    pub frame_height: u32,
    pub record_fps: f64,
}

/// Metadata written as a JSON sidecar next to each recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingMetadata {
    pub id: String,
    pub file_path: String,
    pub checksum: String,
    pub duration_secs: f64,
    pub record_fps: f64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub frames_written: u64,
    /// Duplicate frames inserted by drop compensation during the session.
    pub frames_padded: u64,
    pub box_id: Option<String>,
    pub animal_id: Option<String>,
    pub created_at: String,
}

impl RecordingMetadata {
    pub fn from_result(result: &RecordingResult, frames_padded: u64, labels: &TrialLabels) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: result.file_path.to_string_lossy().into_owned(),
            checksum: result.checksum.clone(),
            duration_secs: result.duration_secs,
            record_fps: result.record_fps,
            frame_width: result.frame_width,
            frame_height: result.frame_height,
            frames_written: result.frames_written,
            frames_padded,
            box_id: labels.box_id.clone(),
            animal_id: labels.animal_id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
