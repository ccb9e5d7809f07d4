//! E-ink display protocol layer
//!
//! Owns the low-level side of a refresh: which waveform the panel controller
//! runs, whether the update is partial or full, which rectangle is addressed,
//! and how that request reaches the kernel driver.
//!
//! # Architecture Layers
//!
//! ```text
//! Event producers (page observers, gestures, menus)
//!         ↓
//! eink-refresh (batching + waveform decision)
//!         ↓
//! DisplayProtocol (this crate - five scenario operations)
//!         ↓
//! FramebufferDisplay → mxcfb ioctl → EPDC kernel driver
//! ```
//!
//! The [`DisplayProtocol`] trait is the seam between policy and hardware.
//! [`FramebufferDisplay`] is the hardware adapter; `eink-testing` provides a
//! recording adapter for host tests.
//!
//! # Example
//!
//! ```no_run
//! use eink_protocol::{DisplayProtocol, DriverConfig, FramebufferDisplay, Region};
//!
//! let mut fb = FramebufferDisplay::open(DriverConfig::default());
//! fb.refresh_partial(Region::new(0, 0, 400, 300));
//! if fb.needs_cleanup() {
//!     fb.refresh_cleanup(954, 1696);
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::print_stdout)] // prefer tracing over println! in lib code
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod clock;
pub mod counters;
#[cfg(unix)]
pub mod framebuffer;
pub mod mxcfb;
pub mod protocol;
pub mod region;
pub mod waveform_mode;

pub use clock::{Clock, MonotonicClock};
pub use counters::RefreshCounters;
#[cfg(unix)]
pub use framebuffer::{Completion, DeviceError, DriverConfig, FramebufferDisplay};
pub use protocol::{DisplayProtocol, SharedDisplay};
pub use region::Region;
pub use waveform_mode::{UpdateMode, WaveformMode};
