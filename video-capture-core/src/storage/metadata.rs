use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::error::CaptureError;
use crate::models::recording_result::RecordingMetadata;

/// Sidecar location for a recording: `{stem}.metadata.json` next to the
/// video file.
pub fn sidecar_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write the JSON sidecar for a finished recording; returns the sidecar
/// path actually written.
pub fn write_metadata(
    metadata: &RecordingMetadata,
    recording_path: &Path,
) -> Result<PathBuf, CaptureError> {
    let path = sidecar_path(recording_path);
    let file = File::create(&path).map_err(|e| {
        CaptureError::StorageError(format!("failed to create sidecar {}: {}", path.display(), e))
    })?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, metadata)
        .map_err(|e| CaptureError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    out.flush()
        .map_err(|e| CaptureError::StorageError(format!("failed to write sidecar: {}", e)))?;
    Ok(path)
}

/// Load the JSON sidecar belonging to `recording_path`.
pub fn read_metadata(recording_path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let path = sidecar_path(recording_path);
    let file = File::open(&path).map_err(|e| {
        CaptureError::StorageError(format!("failed to open sidecar {}: {}", path.display(), e))
    })?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| CaptureError::StorageError(format!("failed to parse metadata: {}", e)))
}
