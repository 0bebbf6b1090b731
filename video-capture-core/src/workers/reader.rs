use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::models::error::CaptureError;
use crate::models::events::ReaderEvent;
use crate::models::frame::Frame;
use crate::session::handle::SharedCameraHandle;
use crate::workers::pacing::{Compensation, DriftTracker, TickScheduler};

/// Consecutive failed reads tolerated on the last-good-frame fallback
/// before escalating to a device-unavailable status.
const MAX_CONSECUTIVE_READ_FAILURES: u32 = 30;

/// Performs the one authorized hardware read per capture tick and forwards
/// frames toward the preview and record paths.
///
/// One reader runs per camera regardless of how many consumers are active;
/// it keeps ticking while either `previewing` or `recording` is set and
/// stops cooperatively when both clear.
///
/// The spawner sets `reader_active` before the thread starts; the reader
/// clears it under the lock in the same critical section as its decision to
/// exit, so a starter that observes the flag set is guaranteed the reader
/// will see freshly set previewing/recording flags on its next tick.
pub struct FrameReader {
    handle: SharedCameraHandle,
    events: Sender<ReaderEvent>,
    scheduler: TickScheduler,
    drift: DriftTracker,
    interval: Duration,
    started_at: Instant,
    last_frame: Option<Frame>,
    consecutive_failures: u32,
}

impl FrameReader {
    pub fn new(handle: SharedCameraHandle, events: Sender<ReaderEvent>) -> Self {
        let interval = handle.lock().capture_interval();
        Self {
            handle,
            events,
            scheduler: TickScheduler::new(),
            drift: DriftTracker::new(),
            interval,
            started_at: Instant::now(),
            last_frame: None,
            consecutive_failures: 0,
        }
    }

    /// Reader loop body. Run on a dedicated thread.
    pub fn run(mut self) {
        self.started_at = Instant::now();

        loop {
            self.scheduler.wait(self.interval);
            if !self.tick() {
                break;
            }
        }

        // No hardware access after this point; `reader_active` was cleared
        // inside the exit tick.
        let _ = self.events.send(ReaderEvent::Finished);
        log::debug!("frame reader stopped");
    }

    /// One capture tick. Returns false when the reader should stop.
    fn tick(&mut self) -> bool {
        // Single lock acquisition: exit check, hardware read, period
        // adoption. The continue flag is checked before the read, and the
        // active flag is cleared atomically with a negative answer.
        let (read, interval) = {
            let mut guard = self.handle.lock();
            if !guard.keep_reading() {
                guard.set_reader_active(false);
                return false;
            }
            let read = guard.read_frame();
            (read, guard.capture_interval())
        };
        self.interval = interval;

        let frame = match read {
            Ok(frame) => {
                self.consecutive_failures = 0;
                self.last_frame = Some(frame.clone());
                frame
            }
            Err(error) => match self.fall_back(error) {
                Some(frame) => frame,
                None => return true, // skip this tick, keep the loop alive
            },
        };

        self.send_frame(frame.clone(), false);
        self.compensate(&frame);
        true
    }

    /// Absorb a transient read failure by reusing the last good frame, up
    /// to a bound; beyond it report the device unavailable each tick.
    fn fall_back(&mut self, error: CaptureError) -> Option<Frame> {
        self.consecutive_failures += 1;
        if self.consecutive_failures > MAX_CONSECUTIVE_READ_FAILURES {
            let _ = self.events.send(ReaderEvent::Error(CaptureError::DeviceUnavailable(
                format!("{} consecutive read failures", self.consecutive_failures),
            )));
            return None;
        }
        let _ = self.events.send(ReaderEvent::Error(error));
        match &self.last_frame {
            Some(frame) => Some(frame.clone()),
            None => {
                let _ = self.events.send(ReaderEvent::Error(CaptureError::FrameUnavailable(
                    "no previous frame to reuse".into(),
                )));
                None
            }
        }
    }

    fn send_frame(&mut self, frame: Frame, padded: bool) {
        let _ = self.events.send(ReaderEvent::Frame { frame, padded });
        self.drift.record_emission(self.interval.as_secs_f64());
    }

    /// Drop/duplicate compensation after each real frame.
    fn compensate(&mut self, frame: &Frame) {
        let elapsed = self.started_at.elapsed().as_secs_f64();
        match self.drift.assess(elapsed, self.interval.as_secs_f64()) {
            Compensation::None => {}
            Compensation::SlowDown => self.scheduler.slow_down(),
            Compensation::Pad(count) => {
                self.scheduler.speed_up();
                for _ in 0..count {
                    self.send_frame(frame.clone(), true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::CameraConfig;
    use crate::traits::video_source::VideoSource;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;

    struct ScriptedSource {
        reads: Arc<AtomicU32>,
        fail_from: Option<u32>,
    }

    impl VideoSource for ScriptedSource {
        fn connect(&mut self) -> Result<(), CaptureError> {
            Ok(())
        }

        fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if let Some(limit) = self.fail_from {
                if n >= limit {
                    return Err(CaptureError::FrameUnavailable("scripted failure".into()));
                }
            }
            Ok(Frame::new(vec![n as u8; 12], 2, 2))
        }

        fn release(&mut self) {}

        fn frame_size(&self) -> (u32, u32) {
            (2, 2)
        }

        fn native_fps(&self) -> Option<f64> {
            None
        }
    }

    fn fast_config() -> CameraConfig {
        CameraConfig {
            capture_fps: 200.0,
            preview_fps: 100.0,
            record_fps: 200.0,
            ..Default::default()
        }
    }

    fn start_reader(
        handle: &SharedCameraHandle,
    ) -> (crossbeam_channel::Receiver<ReaderEvent>, thread::JoinHandle<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        // The spawner owns the active flag, as the orchestrator does.
        handle.lock().set_reader_active(true);
        let reader = FrameReader::new(handle.clone(), tx);
        let join = thread::spawn(move || reader.run());
        (rx, join)
    }

    #[test]
    fn stops_when_neither_flag_remains() {
        let reads = Arc::new(AtomicU32::new(0));
        let source = Box::new(ScriptedSource {
            reads: Arc::clone(&reads),
            fail_from: None,
        });
        let handle = SharedCameraHandle::new(source, &fast_config());
        {
            let mut guard = handle.lock();
            guard.connect().unwrap();
            guard.set_previewing(true);
        }

        let (rx, join) = start_reader(&handle);
        thread::sleep(Duration::from_millis(50));
        handle.lock().set_previewing(false);
        join.join().unwrap();

        let events: Vec<ReaderEvent> = rx.try_iter().collect();
        assert!(matches!(events.last(), Some(ReaderEvent::Finished)));
        let frames = events
            .iter()
            .filter(|e| matches!(e, ReaderEvent::Frame { .. }))
            .count();
        assert!(frames > 0);
        assert!(!handle.lock().reader_active());
    }

    #[test]
    fn reuses_last_frame_on_read_failure() {
        let reads = Arc::new(AtomicU32::new(0));
        let source = Box::new(ScriptedSource {
            reads: Arc::clone(&reads),
            fail_from: Some(3),
        });
        let handle = SharedCameraHandle::new(source, &fast_config());
        {
            let mut guard = handle.lock();
            guard.connect().unwrap();
            guard.set_recording(true);
        }

        let (rx, join) = start_reader(&handle);
        thread::sleep(Duration::from_millis(60));
        handle.lock().set_recording(false);
        join.join().unwrap();

        let events: Vec<ReaderEvent> = rx.try_iter().collect();
        let errors = events
            .iter()
            .filter(|e| matches!(e, ReaderEvent::Error(_)))
            .count();
        let frames = events
            .iter()
            .filter(|e| matches!(e, ReaderEvent::Frame { .. }))
            .count();
        // Failures after the third read are absorbed by the fallback: the
        // loop keeps emitting the last good frame alongside error events.
        assert!(errors > 0);
        assert!(frames > 3);
    }
}
