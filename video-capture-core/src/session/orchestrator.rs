use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;

use crate::models::config::CameraConfig;
use crate::models::error::CaptureError;
use crate::models::events::{PreviewEvent, ReaderEvent, WriterEvent};
use crate::models::frame::{Frame, QueueEntry};
use crate::models::recording_result::{RecordingMetadata, RecordingResult, TrialLabels};
use crate::models::state::{CameraState, TrialState};
use crate::session::handle::SharedCameraHandle;
use crate::storage::metadata::write_metadata;
use crate::storage::video_file_writer::VideoFileWriter;
use crate::traits::camera_delegate::CameraDelegate;
use crate::traits::display_sink::DisplaySink;
use crate::traits::video_source::VideoSource;
use crate::workers::previewer::Previewer;
use crate::workers::reader::FrameReader;
use crate::workers::writer::FrameWriter;

/// How long `disconnect` waits for an in-flight recording to drain.
const DISCONNECT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Queue depth at which writer progress reports escalate to an error.
const BACKLOG_WARN_DEPTH: usize = 500;

struct Sinks {
    display: Option<Arc<dyn DisplaySink>>,
    delegate: Option<Arc<dyn CameraDelegate>>,
}

/// Bookkeeping for one recording, from `start_recording` until the writer's
/// terminal event. Lives behind the session mutex; the drain sentinel is
/// sent while that mutex is held so no frame can be enqueued after it.
struct RecordingSession {
    queue: Sender<QueueEntry>,
    cancel: Arc<AtomicBool>,
    writer_join: Option<JoinHandle<()>>,
    total_frames: u64,
    frames_padded: u64,
    capture_interval_secs: f64,
    draining: bool,
    labels: TrialLabels,
}

/// State shared between the public API and the event pump thread.
struct Shared {
    handle: SharedCameraHandle,
    sinks: Mutex<Sinks>,
    session: Mutex<Option<RecordingSession>>,
    last_result: Mutex<Option<RecordingResult>>,
    status: Mutex<String>,
    trial: Mutex<TrialState>,
    reader_join: Mutex<Option<JoinHandle<()>>>,
    previewer_join: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn set_status(&self, text: &str, log_line: bool) {
        *self.status.lock() = text.to_owned();
        if log_line {
            log::info!("{}", text);
        }
        if let Some(delegate) = self.sinks.lock().delegate.clone() {
            delegate.on_status(text, log_line);
        }
    }

    fn notify_state(&self) {
        let state = {
            let guard = self.handle.lock();
            CameraState::from_flags(guard.previewing(), guard.recording())
        };
        if let Some(delegate) = self.sinks.lock().delegate.clone() {
            delegate.on_state_changed(state);
        }
    }

    fn set_trial(&self, state: TrialState) {
        *self.trial.lock() = state;
        if let Some(delegate) = self.sinks.lock().delegate.clone() {
            delegate.on_trial_state(state);
        }
    }

    fn report_error(&self, error: &CaptureError) {
        log::error!("{}", error);
        if let Some(delegate) = self.sinks.lock().delegate.clone() {
            delegate.on_error(error);
        }
    }
}

/// Owns one camera's worker threads and exposes the preview/record API.
///
/// All worker events funnel into a single pump thread via per-worker
/// channels; the pump performs the fan-out to the display sink and the
/// delegate, routes captured frames into the record queue, and finalizes
/// sessions when the writer reports its terminal event.
pub struct CameraOrchestrator {
    shared: Arc<Shared>,
    jpeg_quality: u8,
    reader_tx: Sender<ReaderEvent>,
    preview_tx: Sender<PreviewEvent>,
    writer_tx: Sender<WriterEvent>,
    shutdown_tx: Sender<()>,
    pump_join: Mutex<Option<JoinHandle<()>>>,
}

impl CameraOrchestrator {
    pub fn new(source: Box<dyn VideoSource>, config: CameraConfig) -> Result<Self, CaptureError> {
        config.validate().map_err(CaptureError::ConfigurationError)?;

        let shared = Arc::new(Shared {
            handle: SharedCameraHandle::new(source, &config),
            sinks: Mutex::new(Sinks {
                display: None,
                delegate: None,
            }),
            session: Mutex::new(None),
            last_result: Mutex::new(None),
            status: Mutex::new(String::new()),
            trial: Mutex::new(TrialState::Waiting),
            reader_join: Mutex::new(None),
            previewer_join: Mutex::new(None),
        });

        let (reader_tx, reader_rx) = crossbeam_channel::unbounded();
        let (preview_tx, preview_rx) = crossbeam_channel::unbounded();
        let (writer_tx, writer_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let pump = EventPump {
            shared: Arc::clone(&shared),
            reader_rx,
            preview_rx,
            writer_rx,
            shutdown_rx,
        };
        let pump_join = thread::Builder::new()
            .name("camera-event-pump".into())
            .spawn(move || pump.run())
            .map_err(|e| CaptureError::Internal(format!("failed to spawn event pump: {}", e)))?;

        Ok(Self {
            shared,
            jpeg_quality: config.jpeg_quality,
            reader_tx,
            preview_tx,
            writer_tx,
            shutdown_tx,
            pump_join: Mutex::new(Some(pump_join)),
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn CameraDelegate>) {
        self.shared.sinks.lock().delegate = Some(delegate);
    }

    pub fn set_display_sink(&self, sink: Arc<dyn DisplaySink>) {
        self.shared.sinks.lock().display = Some(sink);
    }

    /// Open the device. Adopts the device's native capture rate when it
    /// reports one.
    pub fn connect(&self) -> Result<(), CaptureError> {
        {
            let mut guard = self.shared.handle.lock();
            guard.connect()?;
            if let Some(fps) = guard.native_fps() {
                if fps.is_finite() && fps > 0.0 {
                    guard.set_capture_fps(fps)?;
                }
            }
        }
        self.shared.set_trial(TrialState::Waiting);
        self.shared.set_status("camera connected", true);
        Ok(())
    }

    /// Stop everything, drain any in-flight recording, and release the
    /// device.
    pub fn disconnect(&self) {
        self.stop_preview();
        self.stop_recording();

        if !self.wait_until_idle(DISCONNECT_DRAIN_TIMEOUT) {
            // Writer is stuck; force it down rather than leaking the thread.
            if let Some(session) = self.shared.session.lock().as_ref() {
                session.cancel.store(true, Ordering::SeqCst);
            }
            self.wait_until_idle(Duration::from_secs(1));
        }

        if let Some(join) = self.shared.reader_join.lock().take() {
            let _ = join.join();
        }
        self.shared.handle.lock().release();
        self.shared.set_status("camera released", true);
        self.shared.notify_state();
    }

    pub fn start_preview(&self) -> Result<(), CaptureError> {
        {
            let mut guard = self.shared.handle.lock();
            if !guard.connected() {
                return Err(CaptureError::DeviceUnavailable("not connected".into()));
            }
            if guard.previewing() {
                return Ok(());
            }
            guard.set_previewing(true);
        }
        self.ensure_reader()?;

        if let Some(join) = self.shared.previewer_join.lock().take() {
            let _ = join.join();
        }
        let previewer = Previewer::new(self.shared.handle.clone(), self.preview_tx.clone());
        let join = thread::Builder::new()
            .name("camera-previewer".into())
            .spawn(move || previewer.run())
            .map_err(|e| {
                self.shared.handle.lock().set_previewing(false);
                CaptureError::Internal(format!("failed to spawn previewer: {}", e))
            })?;
        *self.shared.previewer_join.lock() = Some(join);

        self.shared.notify_state();
        self.shared.set_status("preview started", true);
        Ok(())
    }

    pub fn stop_preview(&self) {
        {
            let mut guard = self.shared.handle.lock();
            if !guard.previewing() {
                return;
            }
            guard.set_previewing(false);
        }
        if let Some(join) = self.shared.previewer_join.lock().take() {
            let _ = join.join();
        }
        self.shared.notify_state();
        self.shared.set_status("preview stopped", true);
    }

    /// Begin persisting frames to `file_path`.
    ///
    /// Fails with `Busy` while a recording is active or a previous one is
    /// still draining to disk.
    pub fn start_recording(&self, file_path: PathBuf, labels: TrialLabels) -> Result<(), CaptureError> {
        let (width, height, record_fps, capture_fps, capture_interval) = {
            let mut guard = self.shared.handle.lock();
            if !guard.connected() {
                return Err(CaptureError::DeviceUnavailable("not connected".into()));
            }
            if guard.recording() {
                return Err(CaptureError::Busy("already recording".into()));
            }
            if guard.writing() {
                return Err(CaptureError::Busy(
                    "previous recording is still being written".into(),
                ));
            }
            guard.set_recording(true);
            guard.set_writing(true);
            let (width, height) = guard.frame_size();
            (
                width,
                height,
                guard.record_fps(),
                guard.capture_fps(),
                guard.capture_interval(),
            )
        };

        let mut container =
            VideoFileWriter::new(file_path.clone(), width, height, record_fps, self.jpeg_quality);
        if let Err(error) = container.open() {
            let mut guard = self.shared.handle.lock();
            guard.set_recording(false);
            guard.set_writing(false);
            return Err(error);
        }

        let (queue_tx, queue_rx) = crossbeam_channel::unbounded();
        let cancel = Arc::new(AtomicBool::new(false));
        let writer = FrameWriter::new(
            container,
            queue_rx,
            self.writer_tx.clone(),
            capture_fps,
            Arc::clone(&cancel),
        );
        let writer_join = thread::Builder::new()
            .name("frame-writer".into())
            .spawn(move || writer.run())
            .map_err(|e| {
                let mut guard = self.shared.handle.lock();
                guard.set_recording(false);
                guard.set_writing(false);
                CaptureError::Internal(format!("failed to spawn writer: {}", e))
            })?;

        *self.shared.session.lock() = Some(RecordingSession {
            queue: queue_tx,
            cancel,
            writer_join: Some(writer_join),
            total_frames: 0,
            frames_padded: 0,
            capture_interval_secs: capture_interval.as_secs_f64(),
            draining: false,
            labels,
        });

        self.ensure_reader()?;
        self.shared.set_trial(TrialState::Running);
        self.shared.notify_state();
        self.shared
            .set_status(&format!("recording to {}", file_path.display()), true);
        Ok(())
    }

    /// Stop capturing new frames and let the writer drain.
    ///
    /// Finalization is asynchronous: the delegate's `on_recording_finished`
    /// fires once the container is closed and checksummed.
    pub fn stop_recording(&self) {
        {
            let mut guard = self.shared.handle.lock();
            if !guard.recording() {
                return;
            }
            guard.set_recording(false);
        }
        // Through the reader channel, so every frame captured before the
        // stop is routed to the queue ahead of the drain sentinel.
        let _ = self.reader_tx.send(ReaderEvent::RecordingStopped);
        self.shared.notify_state();
        self.shared.set_status("stopping recording, draining queue", true);
    }

    /// Discard the in-flight recording without finalizing the file.
    pub fn abort_recording(&self) {
        {
            let mut guard = self.shared.handle.lock();
            if !guard.recording() && !guard.writing() {
                return;
            }
            guard.set_recording(false);
        }
        {
            let mut session = self.shared.session.lock();
            if let Some(session) = session.as_mut() {
                session.draining = true;
                session.cancel.store(true, Ordering::SeqCst);
            }
        }
        self.shared.notify_state();
        self.shared.set_status("recording aborted", true);
    }

    /// One-off still capture. Uses the cached frame while any worker is
    /// reading; otherwise reads the device directly.
    pub fn snapshot(&self) -> Result<Frame, CaptureError> {
        let mut guard = self.shared.handle.lock();
        if guard.reader_active() || guard.previewing() {
            guard
                .last_frame()
                .ok_or_else(|| CaptureError::FrameUnavailable("no frame captured yet".into()))
        } else {
            guard.read_frame()
        }
    }

    /// Grab a still and save it as a JPEG at `path`.
    pub fn save_snapshot(&self, path: &Path) -> Result<(), CaptureError> {
        let frame = self.snapshot()?;
        crate::storage::still::write_still_jpeg(&frame, path, self.jpeg_quality)?;
        self.shared
            .set_status(&format!("snapshot saved to {}", path.display()), true);
        Ok(())
    }

    pub fn set_capture_fps(&self, fps: f64) -> Result<(), CaptureError> {
        let mut guard = self.shared.handle.lock();
        if guard.recording() {
            return Err(CaptureError::Busy(
                "cannot change capture rate while recording".into(),
            ));
        }
        guard.set_capture_fps(fps)
    }

    pub fn set_record_fps(&self, fps: f64) -> Result<(), CaptureError> {
        let mut guard = self.shared.handle.lock();
        if guard.recording() {
            return Err(CaptureError::Busy(
                "cannot change record rate while recording".into(),
            ));
        }
        guard.set_record_fps(fps)
    }

    /// Preview cadence can change at any time; the previewer adopts it on
    /// its next tick.
    pub fn set_preview_fps(&self, fps: f64) -> Result<(), CaptureError> {
        self.shared.handle.lock().set_preview_fps(fps)
    }

    pub fn capture_fps(&self) -> f64 {
        self.shared.handle.lock().capture_fps()
    }

    pub fn preview_fps(&self) -> f64 {
        self.shared.handle.lock().preview_fps()
    }

    pub fn record_fps(&self) -> f64 {
        self.shared.handle.lock().record_fps()
    }

    pub fn frame_size(&self) -> (u32, u32) {
        self.shared.handle.lock().frame_size()
    }

    pub fn state(&self) -> CameraState {
        let guard = self.shared.handle.lock();
        CameraState::from_flags(guard.previewing(), guard.recording())
    }

    pub fn trial_state(&self) -> TrialState {
        *self.shared.trial.lock()
    }

    pub fn status_text(&self) -> String {
        self.shared.status.lock().clone()
    }

    pub fn last_result(&self) -> Option<RecordingResult> {
        self.shared.last_result.lock().clone()
    }

    /// Block until no recording is active or draining, up to `timeout`.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let idle = {
                let guard = self.shared.handle.lock();
                !guard.recording() && !guard.writing()
            } && self.shared.session.lock().is_none();
            if idle {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    /// Spawn the frame reader unless a live one is running.
    ///
    /// Liveness is judged by `reader_active` read under the camera lock,
    /// not by the thread handle: the reader clears that flag in the same
    /// critical section as its decision to exit, so a set flag means the
    /// reader will still observe the caller's freshly set flags, while a
    /// cleared flag means it is safe to spawn a replacement even if the
    /// old thread has not finished unwinding yet.
    fn ensure_reader(&self) -> Result<(), CaptureError> {
        let mut join_slot = self.shared.reader_join.lock();
        {
            let mut guard = self.shared.handle.lock();
            if guard.reader_active() {
                return Ok(());
            }
            guard.set_reader_active(true);
        }
        if let Some(join) = join_slot.take() {
            let _ = join.join();
        }

        let reader = FrameReader::new(self.shared.handle.clone(), self.reader_tx.clone());
        match thread::Builder::new()
            .name("frame-reader".into())
            .spawn(move || reader.run())
        {
            Ok(join) => {
                *join_slot = Some(join);
                Ok(())
            }
            Err(e) => {
                self.shared.handle.lock().set_reader_active(false);
                Err(CaptureError::Internal(format!("failed to spawn reader: {}", e)))
            }
        }
    }
}

impl Drop for CameraOrchestrator {
    fn drop(&mut self) {
        {
            let mut guard = self.shared.handle.lock();
            guard.set_previewing(false);
            guard.set_recording(false);
        }
        if let Some(session) = self.shared.session.lock().as_mut() {
            session.cancel.store(true, Ordering::SeqCst);
        }
        if let Some(join) = self.shared.previewer_join.lock().take() {
            let _ = join.join();
        }
        if let Some(join) = self.shared.reader_join.lock().take() {
            let _ = join.join();
        }
        let _ = self.shutdown_tx.send(());
        if let Some(join) = self.pump_join.lock().take() {
            let _ = join.join();
        }
        self.shared.handle.lock().release();
    }
}

/// Single consumer of all worker event channels.
struct EventPump {
    shared: Arc<Shared>,
    reader_rx: Receiver<ReaderEvent>,
    preview_rx: Receiver<PreviewEvent>,
    writer_rx: Receiver<WriterEvent>,
    shutdown_rx: Receiver<()>,
}

impl EventPump {
    fn run(self) {
        loop {
            select! {
                recv(self.reader_rx) -> event => match event {
                    Ok(event) => self.on_reader_event(event),
                    Err(_) => break,
                },
                recv(self.preview_rx) -> event => match event {
                    Ok(event) => self.on_preview_event(event),
                    Err(_) => break,
                },
                recv(self.writer_rx) -> event => match event {
                    Ok(event) => self.on_writer_event(event),
                    Err(_) => break,
                },
                recv(self.shutdown_rx) -> _ => break,
            }
        }
        log::debug!("event pump stopped");
    }

    fn on_reader_event(&self, event: ReaderEvent) {
        match event {
            ReaderEvent::Frame { frame, padded } => {
                // Flags first, then the session mutex; the two are never
                // held together.
                let (recording, previewing) = {
                    let guard = self.shared.handle.lock();
                    (guard.recording(), guard.previewing())
                };

                {
                    let mut session = self.shared.session.lock();
                    if let Some(session) = session.as_mut() {
                        if !session.draining {
                            let offset_secs =
                                session.total_frames as f64 * session.capture_interval_secs;
                            session.total_frames += 1;
                            if padded {
                                session.frames_padded += 1;
                            }
                            let _ = session.queue.send(QueueEntry::Frame { frame: frame.clone(), offset_secs });
                        }
                    }
                }

                // While previewing, the previewer drives the display at its
                // own cadence; otherwise mirror the record path.
                if recording && !previewing {
                    if let Some(display) = self.shared.sinks.lock().display.clone() {
                        display.on_frame(&frame, padded);
                    }
                }
            }
            ReaderEvent::Error(error) => {
                self.shared.report_error(&error);
            }
            ReaderEvent::RecordingStopped => {
                let mut session = self.shared.session.lock();
                if let Some(session) = session.as_mut() {
                    if !session.draining {
                        session.draining = true;
                        let _ = session.queue.send(QueueEntry::End);
                    }
                }
            }
            ReaderEvent::Finished => {
                self.shared.notify_state();
            }
        }
    }

    fn on_preview_event(&self, event: PreviewEvent) {
        match event {
            PreviewEvent::Frame(frame) => {
                if let Some(display) = self.shared.sinks.lock().display.clone() {
                    display.on_frame(&frame, false);
                }
            }
            PreviewEvent::Error(error) => {
                self.shared.set_status(&format!("preview: {}", error), false);
            }
            PreviewEvent::Finished => {
                self.shared.notify_state();
            }
        }
    }

    fn on_writer_event(&self, event: WriterEvent) {
        match event {
            WriterEvent::Progress {
                queued,
                recorded_secs,
                frames_skipped,
            } => {
                self.shared.set_status(
                    &format!(
                        "recording {:.1}s, {} skipped, {} queued",
                        recorded_secs, frames_skipped, queued
                    ),
                    false,
                );
                if queued >= BACKLOG_WARN_DEPTH {
                    self.shared.report_error(&CaptureError::QueueBacklog(queued));
                }
            }
            WriterEvent::Finished(result) => {
                let session = self.shared.session.lock().take();
                let frames_padded = match session {
                    Some(mut session) => {
                        if let Some(join) = session.writer_join.take() {
                            let _ = join.join();
                        }
                        let metadata =
                            RecordingMetadata::from_result(&result, session.frames_padded, &session.labels);
                        if let Err(error) = write_metadata(&metadata, &result.file_path) {
                            self.shared.report_error(&error);
                        }
                        session.frames_padded
                    }
                    None => 0,
                };

                self.shared.handle.lock().set_writing(false);
                *self.shared.last_result.lock() = Some(result.clone());
                self.shared.set_trial(TrialState::Finished);
                self.shared.set_status(
                    &format!(
                        "saved {} ({} frames, {} padded)",
                        result.file_path.display(),
                        result.frames_written,
                        frames_padded
                    ),
                    true,
                );
                if let Some(delegate) = self.shared.sinks.lock().delegate.clone() {
                    delegate.on_recording_finished(&result);
                }
                self.shared.notify_state();
            }
            WriterEvent::Failed(error) => {
                if let Some(mut session) = self.shared.session.lock().take() {
                    if let Some(join) = session.writer_join.take() {
                        let _ = join.join();
                    }
                }
                {
                    let mut guard = self.shared.handle.lock();
                    guard.set_recording(false);
                    guard.set_writing(false);
                }
                self.shared.set_trial(TrialState::Stopped);
                self.shared.report_error(&error);
                self.shared.notify_state();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::state::CameraState;
    use crate::traits::video_source::VideoSource;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    /// Source that flags overlapping hardware reads.
    struct ProbeSource {
        in_read: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
        width: u32,
        height: u32,
    }

    impl ProbeSource {
        fn new() -> Self {
            Self {
                in_read: Arc::new(AtomicBool::new(false)),
                overlaps: Arc::new(AtomicUsize::new(0)),
                releases: Arc::new(AtomicUsize::new(0)),
                width: 8,
                height: 8,
            }
        }
    }

    impl VideoSource for ProbeSource {
        fn connect(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            if self.in_read.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(1));
            self.in_read.store(false, Ordering::SeqCst);
            Ok(Frame::new(
                vec![0u8; (self.width * self.height * 3) as usize],
                self.width,
                self.height,
            ))
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }

        fn frame_size(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn native_fps(&self) -> Option<f64> {
            None
        }
    }

    struct CollectingDelegate {
        states: Mutex<Vec<CameraState>>,
        results: Mutex<Vec<RecordingResult>>,
        errors: Mutex<Vec<CaptureError>>,
    }

    impl CollectingDelegate {
        fn new() -> Self {
            Self {
                states: Mutex::new(Vec::new()),
                results: Mutex::new(Vec::new()),
                errors: Mutex::new(Vec::new()),
            }
        }
    }

    impl CameraDelegate for CollectingDelegate {
        fn on_state_changed(&self, state: CameraState) {
            self.states.lock().push(state);
        }

        fn on_trial_state(&self, _state: TrialState) {}

        fn on_status(&self, _text: &str, _log: bool) {}

        fn on_error(&self, error: &CaptureError) {
            self.errors.lock().push(error.clone());
        }

        fn on_recording_finished(&self, result: &RecordingResult) {
            self.results.lock().push(result.clone());
        }
    }

    struct CountingDisplay {
        frames: AtomicUsize,
    }

    impl DisplaySink for CountingDisplay {
        fn on_frame(&self, _frame: &Frame, _padded: bool) {
            self.frames.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_config() -> CameraConfig {
        CameraConfig {
            capture_fps: 100.0,
            preview_fps: 50.0,
            record_fps: 50.0,
            frame_width: 8,
            frame_height: 8,
            jpeg_quality: 85,
        }
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("orchestrator_test_{}", name))
    }

    #[test]
    fn record_session_produces_result_and_sidecar() {
        let source = ProbeSource::new();
        let orchestrator = CameraOrchestrator::new(Box::new(source), fast_config()).unwrap();
        let delegate = Arc::new(CollectingDelegate::new());
        orchestrator.set_delegate(delegate.clone());
        orchestrator.connect().unwrap();

        let path = temp_path("session.avi");
        let labels = TrialLabels {
            box_id: Some("box-2".into()),
            animal_id: Some("m41".into()),
        };
        orchestrator.start_recording(path.clone(), labels).unwrap();
        assert_eq!(orchestrator.state(), CameraState::Recording);
        assert_eq!(orchestrator.trial_state(), TrialState::Running);

        thread::sleep(Duration::from_millis(300));
        orchestrator.stop_recording();
        assert!(orchestrator.wait_until_idle(Duration::from_secs(5)));

        let result = orchestrator.last_result().expect("recording result");
        assert!(result.frames_written > 0);
        assert_eq!(result.checksum.len(), 64);
        assert_eq!(orchestrator.trial_state(), TrialState::Finished);
        assert_eq!(delegate.results.lock().len(), 1);

        let sidecar = path.with_extension("metadata.json");
        let metadata = crate::storage::metadata::read_metadata(&path).unwrap();
        assert_eq!(metadata.box_id.as_deref(), Some("box-2"));
        assert_eq!(metadata.frames_written, result.frames_written);

        fs::remove_file(&path).ok();
        fs::remove_file(&sidecar).ok();
    }

    #[test]
    fn second_start_while_recording_is_busy() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        let path = temp_path("busy_a.avi");
        orchestrator
            .start_recording(path.clone(), TrialLabels::default())
            .unwrap();
        let second = orchestrator.start_recording(temp_path("busy_b.avi"), TrialLabels::default());
        assert!(matches!(second, Err(CaptureError::Busy(_))));

        orchestrator.stop_recording();
        orchestrator.wait_until_idle(Duration::from_secs(5));
        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn rate_changes_rejected_while_recording() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        let path = temp_path("rates.avi");
        orchestrator
            .start_recording(path.clone(), TrialLabels::default())
            .unwrap();
        assert!(matches!(
            orchestrator.set_capture_fps(60.0),
            Err(CaptureError::Busy(_))
        ));
        assert!(matches!(
            orchestrator.set_record_fps(5.0),
            Err(CaptureError::Busy(_))
        ));
        // preview cadence stays adjustable
        orchestrator.set_preview_fps(20.0).unwrap();

        orchestrator.stop_recording();
        orchestrator.wait_until_idle(Duration::from_secs(5));
        orchestrator.set_capture_fps(60.0).unwrap();
        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn preview_frames_reach_display_sink() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        let display = Arc::new(CountingDisplay {
            frames: AtomicUsize::new(0),
        });
        orchestrator.set_display_sink(display.clone());
        orchestrator.connect().unwrap();

        orchestrator.start_preview().unwrap();
        assert_eq!(orchestrator.state(), CameraState::Previewing);
        thread::sleep(Duration::from_millis(200));
        orchestrator.stop_preview();

        assert!(display.frames.load(Ordering::SeqCst) > 0);
        assert_eq!(orchestrator.state(), CameraState::Idle);
    }

    #[test]
    fn no_overlapping_hardware_reads_during_preview_and_record() {
        let source = ProbeSource::new();
        let overlaps = Arc::clone(&source.overlaps);
        let orchestrator = CameraOrchestrator::new(Box::new(source), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        orchestrator.start_preview().unwrap();
        let path = temp_path("overlap.avi");
        orchestrator
            .start_recording(path.clone(), TrialLabels::default())
            .unwrap();
        assert_eq!(orchestrator.state(), CameraState::RecordingPreviewing);

        thread::sleep(Duration::from_millis(300));
        orchestrator.stop_recording();
        orchestrator.stop_preview();
        orchestrator.wait_until_idle(Duration::from_secs(5));

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        fs::remove_file(&path).ok();
        fs::remove_file(path.with_extension("metadata.json")).ok();
    }

    #[test]
    fn reader_survives_preview_to_recording_handoff() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        // Stop preview and immediately start recording, repeatedly: the new
        // session must get frames no matter where the old reader was in its
        // exit when the recording flag went up.
        for round in 0..3 {
            let path = temp_path(&format!("handoff_{}.avi", round));
            orchestrator.start_preview().unwrap();
            thread::sleep(Duration::from_millis(30));
            orchestrator.stop_preview();
            orchestrator
                .start_recording(path.clone(), TrialLabels::default())
                .unwrap();
            thread::sleep(Duration::from_millis(150));
            orchestrator.stop_recording();
            assert!(orchestrator.wait_until_idle(Duration::from_secs(5)));

            let result = orchestrator.last_result().expect("recording result");
            assert!(
                result.frames_written > 0,
                "round {}: session captured no frames",
                round
            );

            fs::remove_file(&path).ok();
            fs::remove_file(path.with_extension("metadata.json")).ok();
        }
    }

    #[test]
    fn disconnect_releases_device_exactly_once() {
        let source = ProbeSource::new();
        let releases = Arc::clone(&source.releases);
        let orchestrator = CameraOrchestrator::new(Box::new(source), fast_config()).unwrap();
        orchestrator.connect().unwrap();
        orchestrator.start_preview().unwrap();
        thread::sleep(Duration::from_millis(50));

        orchestrator.disconnect();
        assert_eq!(releases.load(Ordering::SeqCst), 1);

        // Drop must not release again.
        drop(orchestrator);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn abort_discards_session_without_result() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        let path = temp_path("aborted_session.avi");
        orchestrator
            .start_recording(path.clone(), TrialLabels::default())
            .unwrap();
        thread::sleep(Duration::from_millis(100));
        orchestrator.abort_recording();
        assert!(orchestrator.wait_until_idle(Duration::from_secs(5)));

        assert!(orchestrator.last_result().is_none());
        assert_eq!(orchestrator.trial_state(), TrialState::Stopped);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn snapshot_works_idle_and_while_previewing() {
        let orchestrator =
            CameraOrchestrator::new(Box::new(ProbeSource::new()), fast_config()).unwrap();
        orchestrator.connect().unwrap();

        let still = orchestrator.snapshot().unwrap();
        assert_eq!((still.width(), still.height()), (8, 8));

        orchestrator.start_preview().unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(orchestrator.snapshot().is_ok());
        orchestrator.stop_preview();
    }
}
