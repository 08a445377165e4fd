//! Fixed-interval frame pacing with catch-up.
//!
//! The pacer never accumulates debt: when the loop falls more than one
//! interval behind, the missed slots are counted and the schedule restarts
//! from "now".

use std::time::{Duration, Instant};

/// What the loop should do after producing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// No target rate; continue immediately.
    Unbounded,
    /// Sleep for this long, then continue.
    Sleep(Duration),
    /// The deadline has passed by less than one interval; continue.
    Behind,
    /// More than one interval late. `missed` slots were skipped and the
    /// schedule was resynchronised.
    CaughtUp { missed: u64 },
}

/// Longest interval the pacer schedules; slower rates are clamped to it.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Deadline scheduler for a target frame rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Option<Duration>,
    next: Instant,
}

impl FramePacer {
    /// `target_fps <= 0` (or non-finite) disables pacing. Rates slower
    /// than one frame per [`MAX_INTERVAL`] are paced at that interval.
    pub fn new(target_fps: f64, start: Instant) -> Self {
        let interval = (target_fps.is_finite() && target_fps > 0.0).then(|| {
            Duration::try_from_secs_f64(1.0 / target_fps)
                .map_or(MAX_INTERVAL, |d| d.min(MAX_INTERVAL))
        });
        Self {
            interval,
            next: start,
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// The next scheduled frame time.
    pub fn deadline(&self) -> Instant {
        self.next
    }

    /// Advance the schedule by one frame, given the current time.
    pub fn advance(&mut self, now: Instant) -> Pace {
        let Some(interval) = self.interval else {
            return Pace::Unbounded;
        };

        self.next += interval;
        let late = now.saturating_duration_since(self.next);
        if late > interval {
            let missed = (late.as_nanos() / interval.as_nanos().max(1)) as u64;
            self.next = now + interval;
            return Pace::CaughtUp { missed };
        }

        if self.next > now {
            Pace::Sleep(self.next - now)
        } else {
            Pace::Behind
        }
    }
}
