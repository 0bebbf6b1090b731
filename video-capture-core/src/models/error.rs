use thiserror::Error;

/// Errors that can occur during camera capture operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("frame unavailable: {0}")]
    FrameUnavailable(String),

    #[error("writer backlog: {0} frames queued")]
    QueueBacklog(usize),

    #[error("encoder failure: {0}")]
    EncoderFailure(String),

    #[error("invalid configuration: {0}")]
    ConfigurationError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("camera busy: {0}")]
    Busy(String),

    #[error("internal error: {0}")]
    Internal(String),
}
