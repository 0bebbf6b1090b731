//! Tick scheduling and drop/duplicate compensation for the frame reader.
//!
//! The scheduler computes each wake time from the current period instead of
//! relying on a free-running timer, so an fps change takes effect on the
//! very next tick. The drift tracker compares wall-clock elapsed time with
//! the time attributed to frames already emitted and decides when to pad
//! with duplicates or trim the schedule.

use std::thread;
use std::time::{Duration, Instant};

/// Schedule trim applied per compensation nudge: 0.5 ms.
const TRIM_STEP_SECS: f64 = 0.0005;

/// Compensation decided after a reader tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compensation {
    /// Attributed time is within tolerance of wall clock.
    None,
    /// The loop runs ahead of wall clock; lengthen the tick period.
    SlowDown,
    /// The loop fell behind; emit this many duplicate frames and shorten
    /// the tick period.
    Pad(u32),
}

/// Explicit next-wake scheduler for a periodic worker.
pub struct TickScheduler {
    next_wake: Instant,
    /// Additive trim on each period, in seconds. Negative speeds up.
    trim: f64,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            next_wake: Instant::now(),
            trim: 0.0,
        }
    }

    /// Sleep until the next tick boundary for `period`, then advance it.
    ///
    /// If the previous tick overran its slot the schedule is rebased to now
    /// rather than sprinting through missed slots; padding makes up the
    /// attributed time instead.
    pub fn wait(&mut self, period: Duration) {
        let step = (period.as_secs_f64() + self.trim).max(0.0);
        self.next_wake += Duration::from_secs_f64(step);

        let now = Instant::now();
        if self.next_wake > now {
            thread::sleep(self.next_wake - now);
        } else {
            self.next_wake = now;
        }
    }

    pub fn slow_down(&mut self) {
        self.trim += TRIM_STEP_SECS;
    }

    pub fn speed_up(&mut self) {
        self.trim -= TRIM_STEP_SECS;
    }

    #[cfg(test)]
    fn trim(&self) -> f64 {
        self.trim
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks the divergence between wall-clock elapsed time and the time
/// attributed to emitted frames.
///
/// Kept free of clock reads so compensation is testable against simulated
/// tick sequences; the reader supplies elapsed seconds.
pub struct DriftTracker {
    attributed_secs: f64,
}

impl DriftTracker {
    pub fn new() -> Self {
        Self { attributed_secs: 0.0 }
    }

    /// Account one emitted frame (real or padded) at the current period.
    pub fn record_emission(&mut self, period_secs: f64) {
        self.attributed_secs += period_secs;
    }

    /// Time attributed to frames emitted so far, in seconds.
    pub fn attributed_secs(&self) -> f64 {
        self.attributed_secs
    }

    /// Decide compensation for the gap between `elapsed_secs` and the
    /// attributed counter:
    ///
    /// `frames_elapsed = floor((elapsed - attributed) / period)`
    /// - negative: running ahead of wall clock, slow the schedule;
    /// - greater than two: fell behind, pad `frames_elapsed - 1` duplicates
    ///   (pulling the gap back under two periods) and speed the schedule.
    pub fn assess(&self, elapsed_secs: f64, period_secs: f64) -> Compensation {
        let frames_elapsed = ((elapsed_secs - self.attributed_secs) / period_secs).floor() as i64;
        if frames_elapsed < 0 {
            Compensation::SlowDown
        } else if frames_elapsed > 2 {
            Compensation::Pad((frames_elapsed - 1) as u32)
        } else {
            Compensation::None
        }
    }
}

impl Default for DriftTracker {
    fn default() -> Self {
        Self::new()
    }
}
