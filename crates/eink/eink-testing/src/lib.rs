//! E-Ink Refresh Testing Utilities
//!
//! Headless stand-ins for the two things a refresh engine touches outside
//! itself: the display driver and the clock.
//!
//! # Quick start
//!
//! ```
//! use eink_protocol::{DisplayProtocol, Region, SharedDisplay};
//! use eink_testing::{DisplayCall, ManualClock, RecordingDisplay};
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut display = SharedDisplay::new(RecordingDisplay::new());
//!
//! display.refresh_ui(Region::full_screen(100, 100));
//! clock.advance(Duration::from_millis(250));
//!
//! let calls = display.with(|d| d.calls().to_vec()).unwrap();
//! assert_eq!(calls, vec![DisplayCall::Ui(Region::full_screen(100, 100))]);
//! ```

#![warn(clippy::all)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![allow(clippy::module_name_repetitions)]

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use eink_protocol::counters::RefreshClass;
use eink_protocol::{Clock, DisplayProtocol, RefreshCounters, Region, WaveformMode};

// ─────────────────────────────────────────────────────────────────────────────
// DisplayCall
// ─────────────────────────────────────────────────────────────────────────────

/// One scenario call received by a [`RecordingDisplay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCall {
    /// `refresh_full(width, height)`
    Full {
        /// Screen width
        width: u32,
        /// Screen height
        height: u32,
    },
    /// `refresh_partial(region)`
    Partial(Region),
    /// `refresh_ui(region)`
    Ui(Region),
    /// `refresh_a2(region)`
    A2(Region),
    /// `refresh_scroll(width, height)`
    Scroll {
        /// Screen width
        width: u32,
        /// Screen height
        height: u32,
    },
    /// `refresh_cleanup(width, height)`
    Cleanup {
        /// Screen width
        width: u32,
        /// Screen height
        height: u32,
    },
}

impl DisplayCall {
    /// Waveform a hardware driver would run for this call.
    ///
    /// Scroll calls report GL16; the A2 fast path depends on driver timing
    /// that the recorder does not model.
    pub fn waveform(&self) -> WaveformMode {
        match self {
            DisplayCall::Full { .. } => WaveformMode::GC16,
            DisplayCall::Partial(_) | DisplayCall::Scroll { .. } => WaveformMode::GL16,
            DisplayCall::Ui(_) => WaveformMode::DU,
            DisplayCall::A2(_) => WaveformMode::A2,
            DisplayCall::Cleanup { .. } => WaveformMode::Init,
        }
    }

    /// True for calls that reset the panel (full or cleanup).
    pub fn is_full(&self) -> bool {
        self.waveform().clears_ghosting()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RecordingDisplay
// ─────────────────────────────────────────────────────────────────────────────

/// Mock [`DisplayProtocol`] adapter that records every call.
///
/// Keeps the same cleanup counters as the hardware driver so
/// [`DisplayProtocol::needs_cleanup`] behaves identically.
#[derive(Debug, Default)]
pub struct RecordingDisplay {
    calls: Vec<DisplayCall>,
    counters: RefreshCounters,
}

impl RecordingDisplay {
    /// Recorder with the default cleanup maxima.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorder with custom cleanup maxima.
    pub fn with_maxima(max_partial: u32, max_fast: u32) -> Self {
        Self {
            calls: Vec::new(),
            counters: RefreshCounters::with_maxima(max_partial, max_fast),
        }
    }

    /// All calls received so far, oldest first.
    pub fn calls(&self) -> &[DisplayCall] {
        &self.calls
    }

    /// Most recent call.
    pub fn last_call(&self) -> Option<DisplayCall> {
        self.calls.last().copied()
    }

    /// Number of calls received.
    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Forget recorded calls (counters are kept).
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Driver-side cleanup counters.
    pub fn counters(&self) -> &RefreshCounters {
        &self.counters
    }

    fn record(&mut self, call: DisplayCall, class: RefreshClass) {
        self.calls.push(call);
        self.counters.record(class);
    }
}

impl DisplayProtocol for RecordingDisplay {
    fn refresh_full(&mut self, width: u32, height: u32) {
        self.record(DisplayCall::Full { width, height }, RefreshClass::Full);
    }

    fn refresh_partial(&mut self, region: Region) {
        self.record(DisplayCall::Partial(region), RefreshClass::Partial);
    }

    fn refresh_ui(&mut self, region: Region) {
        self.record(DisplayCall::Ui(region), RefreshClass::Partial);
    }

    fn refresh_a2(&mut self, region: Region) {
        self.record(DisplayCall::A2(region), RefreshClass::Fast);
    }

    fn refresh_scroll(&mut self, width: u32, height: u32) {
        self.record(DisplayCall::Scroll { width, height }, RefreshClass::Partial);
    }

    fn refresh_cleanup(&mut self, width: u32, height: u32) {
        self.record(DisplayCall::Cleanup { width, height }, RefreshClass::Full);
    }

    fn needs_cleanup(&self) -> bool {
        self.counters.needs_cleanup()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ManualClock
// ─────────────────────────────────────────────────────────────────────────────

/// Deterministic [`Clock`] that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the code under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<Instant>>,
}

impl ManualClock {
    /// Clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(Instant::now())),
        }
    }

    /// Move time forward by `step`.
    #[allow(clippy::arithmetic_side_effects)]
    pub fn advance(&self, step: Duration) {
        self.now.set(self.now.get() + step);
    }

    /// Move time forward by `ms` milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }
}
