use std::time::Duration;

use crossbeam_channel::Sender;

use crate::models::error::CaptureError;
use crate::models::events::PreviewEvent;
use crate::session::handle::SharedCameraHandle;
use crate::workers::pacing::TickScheduler;

/// Republishes the most recent captured frame at the preview cadence.
///
/// When the reader is active the previewer only consults the cached frame
/// under the lock; it performs a direct hardware read only while it is the
/// sole consumer, so the single-reader rule holds either way.
pub struct Previewer {
    handle: SharedCameraHandle,
    events: Sender<PreviewEvent>,
    scheduler: TickScheduler,
    interval: Duration,
}

impl Previewer {
    pub fn new(handle: SharedCameraHandle, events: Sender<PreviewEvent>) -> Self {
        let interval = handle.lock().preview_interval();
        Self {
            handle,
            events,
            scheduler: TickScheduler::new(),
            interval,
        }
    }

    /// Previewer loop body. Run on a dedicated thread.
    pub fn run(mut self) {
        loop {
            self.scheduler.wait(self.interval);

            let (frame, interval, keep_going) = {
                let mut guard = self.handle.lock();
                if !guard.previewing() {
                    (Ok(None), guard.preview_interval(), false)
                } else if guard.reader_active() {
                    // The reader owns the hardware; show whatever it cached.
                    (Ok(guard.last_frame()), guard.preview_interval(), true)
                } else {
                    match guard.read_frame() {
                        Ok(frame) => (Ok(Some(frame)), guard.preview_interval(), true),
                        Err(error) => (Err(error), guard.preview_interval(), true),
                    }
                }
            };
            self.interval = interval;

            if !keep_going {
                break;
            }

            match frame {
                Ok(Some(frame)) => {
                    let _ = self.events.send(PreviewEvent::Frame(frame));
                }
                Ok(None) => {
                    let _ = self.events.send(PreviewEvent::Error(
                        CaptureError::FrameUnavailable("no frame captured yet".into()),
                    ));
                }
                Err(error) => {
                    let _ = self.events.send(PreviewEvent::Error(error));
                }
            }
        }

        let _ = self.events.send(PreviewEvent::Finished);
        log::debug!("previewer stopped");
    }
}
