//! Typed event channels between workers and the orchestrator's event pump.
//!
//! Each worker owns the sending half of its own channel; the pump selects
//! over all of them. Delivery is FIFO within each channel.

use super::error::CaptureError;
use super::frame::Frame;
use super::recording_result::RecordingResult;

/// Events emitted by the frame reader.
#[derive(Debug, Clone)]
pub enum ReaderEvent {
    /// A frame bound for the record path. `padded` marks duplicates inserted
    /// by drop compensation; padded frames count as dropped.
    Frame { frame: Frame, padded: bool },
    /// Non-fatal read problem; the reader keeps running.
    Error(CaptureError),
    /// Ordering marker injected into the reader's channel when recording
    /// stops. Every frame ahead of it was captured during the session and
    /// must still reach the record queue before the drain sentinel.
    RecordingStopped,
    /// The reader observed that neither preview nor recording remains
    /// active and has stopped. Emitted exactly once per reader.
    Finished,
}

/// Events emitted by the previewer.
#[derive(Debug, Clone)]
pub enum PreviewEvent {
    Frame(Frame),
    Error(CaptureError),
    Finished,
}

/// Events emitted by the frame writer.
#[derive(Debug, Clone)]
pub enum WriterEvent {
    /// Counters snapshot, emitted every `PROGRESS_EVERY` dequeues.
    Progress {
        /// Entries still waiting in the record queue.
        queued: usize,
        /// Recorded media time accumulated so far, in seconds.
        recorded_secs: f64,
        /// Dequeued entries skipped by rate downsampling.
        frames_skipped: u64,
    },
    /// The writer consumed the sentinel and finalized its container.
    Finished(RecordingResult),
    /// Encoder or storage failure fatal to this recording session.
    Failed(CaptureError),
}
