//! Monotonic time source
//!
//! Every timing decision in the refresh path (scroll-speed detection, batch
//! windows, full-refresh spacing) reads time through [`Clock`] so host tests
//! can step time deterministically instead of sleeping.

use std::time::Instant;

/// Source of monotonic instants.
pub trait Clock {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Time elapsed since `earlier`, saturating at zero.
    fn since(&self, earlier: Instant) -> std::time::Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Wall-clock backed [`Clock`] using [`Instant::now`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
