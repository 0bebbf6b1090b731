//! Core capture pipeline for multi-camera behavioral recording rigs.
//!
//! Each camera runs an independent pipeline behind a [`CameraOrchestrator`]:
//! a frame reader performs the single authorized hardware read per capture
//! tick, a previewer republishes the latest frame at the display cadence,
//! and a frame writer drains the record queue into an MJPEG/AVI container
//! at the configured record rate.
//!
//! Architecture:
//!
//! ```text
//! CameraOrchestrator
//!   ├── SharedCameraHandle          device + flags behind one mutex
//!   ├── frame-reader thread         paced reads, drop/duplicate compensation
//!   ├── camera-previewer thread     cached-frame republish for the display
//!   ├── frame-writer thread         downsample + persist, drain sentinel
//!   └── camera-event-pump thread    fan-out to delegate and display sink
//! ```
//!
//! Integrators supply a [`VideoSource`] for the device, a [`DisplaySink`]
//! for preview frames, and a [`CameraDelegate`] for state, status, and
//! completion callbacks.

pub mod models;
pub mod session;
pub mod storage;
pub mod traits;
pub mod workers;

pub use models::config::CameraConfig;
pub use models::error::CaptureError;
pub use models::frame::Frame;
pub use models::recording_result::{RecordingMetadata, RecordingResult, TrialLabels};
pub use models::state::{CameraState, TrialState};
pub use session::orchestrator::CameraOrchestrator;
pub use traits::camera_delegate::CameraDelegate;
pub use traits::display_sink::DisplaySink;
pub use traits::video_source::VideoSource;
