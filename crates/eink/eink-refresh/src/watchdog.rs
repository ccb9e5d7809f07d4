//! Idle cleanup watchdog
//!
//! Runs beside the engines on the shared display. Every bit of activity
//! pushes the deadline back; once the panel has been quiet for the whole
//! delay, the watchdog asks the driver whether its counters call for a
//! cleanup and issues one if so.

use std::time::{Duration, Instant};

use eink_protocol::{Clock, DisplayProtocol, MonotonicClock};

/// Default quiet period before a cleanup check.
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_millis(500);

/// Activity-re-armed cleanup check for one display.
#[derive(Debug)]
pub struct CleanupWatchdog<C: Clock = MonotonicClock> {
    clock: C,
    delay: Duration,
    width: u32,
    height: u32,
    deadline: Option<Instant>,
}

impl<C: Clock> CleanupWatchdog<C> {
    /// Watchdog for a `width`×`height` panel.
    pub fn new(clock: C, delay: Duration, width: u32, height: u32) -> Self {
        Self {
            clock,
            delay,
            width,
            height,
            deadline: None,
        }
    }

    /// Push the check back by the full delay.
    pub fn note_activity(&mut self) {
        let now = self.clock.now();
        self.deadline = Some(now.checked_add(self.delay).unwrap_or(now));
    }

    /// Armed deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Run the check if its deadline has passed.
    ///
    /// Returns true if a cleanup refresh was issued.
    pub fn poll<D: DisplayProtocol>(&mut self, display: &mut D) -> bool {
        let now = self.clock.now();
        if !self.deadline.is_some_and(|d| now >= d) {
            return false;
        }
        self.deadline = None;

        if !display.needs_cleanup() {
            return false;
        }
        tracing::info!(width = self.width, height = self.height, "idle cleanup");
        display.refresh_cleanup(self.width, self.height);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eink_protocol::Region;
    use eink_testing::{DisplayCall, ManualClock, RecordingDisplay};

    #[test]
    fn test_cleans_up_only_when_driver_asks() {
        let clock = ManualClock::new();
        let mut wd = CleanupWatchdog::new(clock.clone(), DEFAULT_CLEANUP_DELAY, 100, 200);
        let mut display = RecordingDisplay::with_maxima(2, 10);

        display.refresh_ui(Region::full_screen(100, 200));
        wd.note_activity();
        clock.advance_ms(500);
        assert!(!wd.poll(&mut display));
        assert_eq!(wd.next_deadline(), None);

        display.refresh_ui(Region::full_screen(100, 200));
        wd.note_activity();
        clock.advance_ms(499);
        assert!(!wd.poll(&mut display));
        clock.advance_ms(1);
        assert!(wd.poll(&mut display));
        assert_eq!(
            display.last_call(),
            Some(DisplayCall::Cleanup {
                width: 100,
                height: 200
            })
        );
        assert!(!display.needs_cleanup());
    }

    #[test]
    fn test_activity_pushes_deadline_back() {
        let clock = ManualClock::new();
        let mut wd = CleanupWatchdog::new(clock.clone(), DEFAULT_CLEANUP_DELAY, 10, 10);
        let mut display = RecordingDisplay::with_maxima(1, 1);
        display.refresh_a2(Region::full_screen(10, 10));

        wd.note_activity();
        clock.advance_ms(400);
        wd.note_activity();
        clock.advance_ms(400);
        assert!(!wd.poll(&mut display));
        clock.advance_ms(100);
        assert!(wd.poll(&mut display));
    }
}
