use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::models::error::CaptureError;
use crate::models::events::WriterEvent;
use crate::models::frame::QueueEntry;
use crate::models::recording_result::RecordingResult;
use crate::storage::video_file_writer::VideoFileWriter;

/// Queue-depth progress report cadence, in dequeued frames.
const PROGRESS_EVERY: u64 = 100;

/// Poll interval while the queue is empty, so the cancel flag is observed
/// even when no frames arrive.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drains the record queue, downsamples to the record rate, and persists
/// the surviving frames into the container.
///
/// Exclusive owner of the `VideoFileWriter`. The recorded-time accumulator
/// advances by one record period per persisted frame; the save rule keeps
/// it within two record periods of each entry's capture offset, so stretches
/// of skipped or padded input are caught up with extra persists instead of
/// drifting.
pub struct FrameWriter {
    container: VideoFileWriter,
    queue: Receiver<QueueEntry>,
    events: Sender<WriterEvent>,
    cancel: Arc<AtomicBool>,
    /// Persist every Nth entry under nominal pacing.
    save_freq: u64,
    record_period: f64,
    entries_seen: u64,
    recorded_secs: f64,
    frames_skipped: u64,
}

impl FrameWriter {
    /// `container` must already be open.
    pub fn new(
        container: VideoFileWriter,
        queue: Receiver<QueueEntry>,
        events: Sender<WriterEvent>,
        capture_fps: f64,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let record_fps = container.fps();
        let save_freq = ((capture_fps / record_fps).round() as u64).max(1);
        Self {
            container,
            queue,
            events,
            cancel,
            save_freq,
            record_period: 1.0 / record_fps,
            entries_seen: 0,
            recorded_secs: 0.0,
            frames_skipped: 0,
        }
    }

    /// Writer loop body. Run on a dedicated thread; returns after the drain
    /// sentinel, a cancel, or a fatal storage error.
    pub fn run(mut self) {
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                self.container.abort();
                let _ = self.events.send(WriterEvent::Failed(CaptureError::Internal(
                    "recording cancelled".into(),
                )));
                return;
            }

            let entry = match self.queue.recv_timeout(POLL_INTERVAL) {
                Ok(entry) => entry,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    // Producer vanished without the sentinel. Keep the
                    // partial file but report the session failed.
                    self.container.abort();
                    let _ = self.events.send(WriterEvent::Failed(CaptureError::Internal(
                        "record queue closed before drain sentinel".into(),
                    )));
                    return;
                }
            };

            match entry {
                QueueEntry::Frame { frame, offset_secs } => {
                    self.entries_seen += 1;
                    if self.should_persist(offset_secs) {
                        if let Err(error) = self.container.write_frame(&frame) {
                            self.container.abort();
                            let _ = self.events.send(WriterEvent::Failed(error));
                            return;
                        }
                        self.recorded_secs += self.record_period;
                    } else {
                        self.frames_skipped += 1;
                    }
                    if self.entries_seen % PROGRESS_EVERY == 0 {
                        let _ = self.events.send(WriterEvent::Progress {
                            queued: self.queue.len(),
                            recorded_secs: self.recorded_secs,
                            frames_skipped: self.frames_skipped,
                        });
                    }
                }
                QueueEntry::End => {
                    self.finalize();
                    return;
                }
            }
        }
    }

    /// Save rule: persist on the nominal cadence unless recorded time has
    /// overshot this entry's capture offset by two record periods, and
    /// persist off-cadence whenever recorded time lags it by more than two.
    fn should_persist(&self, offset_secs: f64) -> bool {
        let on_cadence = self.entries_seen % self.save_freq == 0
            && self.recorded_secs < offset_secs + 2.0 * self.record_period;
        let catching_up = self.recorded_secs < offset_secs - 2.0 * self.record_period;
        on_cadence || catching_up
    }

    fn finalize(mut self) {
        let frames_written = self.container.frames_written();
        let (frame_width, frame_height) = self.container.frame_size();
        let record_fps = self.container.fps();
        match self.container.close() {
            Ok(checksum) => {
                let result = RecordingResult {
                    file_path: self.container.file_path().to_path_buf(),
                    duration_secs: self.recorded_secs,
                    frames_written,
                    frames_skipped: self.frames_skipped,
                    checksum,
                    frame_width,
                    frame_height,
                    record_fps,
                };
                log::info!(
                    "recording finalized: {} frames, {:.2}s, {}",
                    result.frames_written,
                    result.duration_secs,
                    result.file_path.display()
                );
                let _ = self.events.send(WriterEvent::Finished(result));
            }
            Err(error) => {
                let _ = self.events.send(WriterEvent::Failed(error));
            }
        }
    }
}
