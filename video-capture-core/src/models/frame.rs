use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// One captured video frame, tightly packed RGB8.
///
/// Pixel data lives behind an `Arc` so the preview path, the record queue,
/// and padded duplicates share one buffer instead of copying it.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    width: u32,
    height: u32,
    captured_at: Instant,
}

impl Frame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 3) as usize);
        Self {
            pixels: pixels.into(),
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// One element of the record queue.
#[derive(Debug, Clone)]
pub enum QueueEntry {
    /// A frame with its capture-time offset from the start of the session,
    /// in seconds of attributed capture time.
    Frame { frame: Frame, offset_secs: f64 },
    /// Drain sentinel: everything before it must be processed, then the
    /// container finalized. Sent exactly once per recording session.
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_report_geometry() {
        let frame = Frame::new(vec![7u8; 2 * 3 * 3], 2, 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.pixels().len(), 18);
        assert!(frame.pixels().iter().all(|&b| b == 7));
    }

    #[test]
    fn clone_shares_pixels() {
        let frame = Frame::new(vec![0u8; 12], 2, 2);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels(), copy.pixels()));
    }
}
