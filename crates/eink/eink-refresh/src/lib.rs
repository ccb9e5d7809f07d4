//! E-Ink Refresh Decision Engine
//!
//! Turns the stream of change notifications coming out of a reading surface
//! (DOM mutations, scrolls, page turns, menus, load completion) into a small
//! number of panel refreshes, trading latency against ghosting.
//!
//! # Architecture
//!
//! ```text
//! producers ──push_event / parse_js_events / trigger_*──▶ RefreshManager
//!                                                          │ batch window
//!                                                          ▼
//!                                                  decide → execute
//!                                                          │
//!                                                          ▼
//!                                               DisplayProtocol (driver)
//! ```
//!
//! One [`RefreshManager`] runs per surface. Each keeps its own ghosting risk,
//! counters and queue, even when several share one physical display through
//! [`eink_protocol::SharedDisplay`]. Everything runs on one thread; time only
//! moves when the host calls [`RefreshManager::poll`].
//!
//! # Example
//!
//! ```
//! use eink_refresh::RefreshManager;
//! use eink_testing::{ManualClock, RecordingDisplay};
//!
//! let clock = ManualClock::new();
//! let mut engine = RefreshManager::new("demo", RecordingDisplay::new(), clock.clone(), 954, 1696);
//!
//! engine.parse_js_events(r#"[{"t":"dom","s":120}]"#);
//! clock.advance_ms(200);
//! engine.poll();
//!
//! assert_eq!(engine.display().call_count(), 1);
//! ```

#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::print_stdout)] // log through tracing

pub mod config;
pub mod engine;
pub mod event;
pub mod js_events;
pub mod policy;
pub mod repaint;
pub mod stats;
pub mod watchdog;

pub use config::{RefreshConfig, RepaintConfig};
pub use engine::{BatchSummary, RefreshManager};
pub use event::{DirtyRect, EventKind, RefreshEvent};
pub use js_events::{parse_events, parse_records, PageRecord, PayloadError, TraceReason, TraceRecord};
pub use policy::{PolicyMode, WaveformChoice};
pub use repaint::RepaintReason;
pub use stats::RefreshStats;
pub use watchdog::{CleanupWatchdog, DEFAULT_CLEANUP_DELAY};
