//! Scenario-level display protocol
//!
//! Callers never pick raw waveform/mode pairs. They ask for one of six
//! scenarios and the adapter maps it onto the panel:
//!
//! | Operation          | Waveform | Mode    | Counter   |
//! |--------------------|----------|---------|-----------|
//! | `refresh_full`     | GC16     | full    | reset     |
//! | `refresh_partial`  | GL16     | partial | partial+1 |
//! | `refresh_ui`       | DU       | partial | partial+1 |
//! | `refresh_a2`       | A2       | partial | fast+1    |
//! | `refresh_scroll`   | A2/GL16  | partial | fast/partial+1 |
//! | `refresh_cleanup`  | INIT     | full    | reset     |

use std::cell::RefCell;
use std::rc::Rc;

use crate::region::Region;

/// Display driver trait for e-ink panels driven through an update-region
/// protocol.
///
/// Implementations must not panic or return errors for hardware failures;
/// a failed update is logged and dropped.
pub trait DisplayProtocol {
    /// Full-screen GC16 update in full mode. Resets cleanup counters.
    fn refresh_full(&mut self, width: u32, height: u32);

    /// GL16 region update in partial mode.
    fn refresh_partial(&mut self, region: Region);

    /// DU region update in partial mode, for menus and UI chrome.
    fn refresh_ui(&mut self, region: Region);

    /// A2 region update in partial mode. Accepts visible ghosting.
    fn refresh_a2(&mut self, region: Region);

    /// Full-screen scroll update: A2 while calls arrive back-to-back,
    /// GL16 once scrolling has settled.
    fn refresh_scroll(&mut self, width: u32, height: u32);

    /// Full-screen INIT update that erases accumulated ghosting.
    fn refresh_cleanup(&mut self, width: u32, height: u32);

    /// True when the partial or fast counter has reached its maximum since
    /// the last full/cleanup refresh.
    fn needs_cleanup(&self) -> bool;
}

/// Single-context shared handle to one display.
///
/// One physical panel is driven by several refresh engines (one per reading
/// surface). All of them run on the same event loop, so a reference-counted
/// cell is enough; no update is ever issued while another is in flight.
#[derive(Debug)]
pub struct SharedDisplay<D> {
    inner: Rc<RefCell<D>>,
}

impl<D> SharedDisplay<D> {
    /// Wrap a display for sharing.
    pub fn new(display: D) -> Self {
        Self {
            inner: Rc::new(RefCell::new(display)),
        }
    }

    /// Run `f` with shared access to the display.
    ///
    /// Returns `None` if the display is currently mutably borrowed.
    pub fn with<R>(&self, f: impl FnOnce(&D) -> R) -> Option<R> {
        self.inner.try_borrow().ok().map(|d| f(&d))
    }

    /// Run `f` with exclusive access to the display.
    ///
    /// Returns `None` if the display is already borrowed.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut D) -> R) -> Option<R> {
        self.inner.try_borrow_mut().ok().map(|mut d| f(&mut d))
    }

    /// Number of handles sharing this display.
    pub fn handle_count(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl<D> Clone for SharedDisplay<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: DisplayProtocol> SharedDisplay<D> {
    fn dispatch(&self, op: &'static str, f: impl FnOnce(&mut D)) {
        if self.with_mut(f).is_none() {
            tracing::warn!(op, "display busy, update dropped");
        }
    }
}

impl<D: DisplayProtocol> DisplayProtocol for SharedDisplay<D> {
    fn refresh_full(&mut self, width: u32, height: u32) {
        self.dispatch("full", |d| d.refresh_full(width, height));
    }

    fn refresh_partial(&mut self, region: Region) {
        self.dispatch("partial", |d| d.refresh_partial(region));
    }

    fn refresh_ui(&mut self, region: Region) {
        self.dispatch("ui", |d| d.refresh_ui(region));
    }

    fn refresh_a2(&mut self, region: Region) {
        self.dispatch("a2", |d| d.refresh_a2(region));
    }

    fn refresh_scroll(&mut self, width: u32, height: u32) {
        self.dispatch("scroll", |d| d.refresh_scroll(width, height));
    }

    fn refresh_cleanup(&mut self, width: u32, height: u32) {
        self.dispatch("cleanup", |d| d.refresh_cleanup(width, height));
    }

    fn needs_cleanup(&self) -> bool {
        self.with(|d| d.needs_cleanup()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct CountingDisplay {
        calls: u32,
    }

    impl DisplayProtocol for CountingDisplay {
        fn refresh_full(&mut self, _: u32, _: u32) {
            self.calls += 1;
        }
        fn refresh_partial(&mut self, _: Region) {
            self.calls += 1;
        }
        fn refresh_ui(&mut self, _: Region) {
            self.calls += 1;
        }
        fn refresh_a2(&mut self, _: Region) {
            self.calls += 1;
        }
        fn refresh_scroll(&mut self, _: u32, _: u32) {
            self.calls += 1;
        }
        fn refresh_cleanup(&mut self, _: u32, _: u32) {
            self.calls += 1;
        }
        fn needs_cleanup(&self) -> bool {
            self.calls >= 3
        }
    }

    #[test]
    fn test_clones_drive_the_same_display() {
        let mut a = SharedDisplay::new(CountingDisplay::default());
        let mut b = a.clone();
        assert_eq!(a.handle_count(), 2);

        a.refresh_ui(Region::full_screen(10, 10));
        b.refresh_a2(Region::full_screen(10, 10));
        assert!(!b.needs_cleanup());
        b.refresh_full(10, 10);

        assert_eq!(a.with(|d| d.calls), Some(3));
        assert!(a.needs_cleanup());
    }

    #[test]
    fn test_busy_display_drops_update() {
        let shared = SharedDisplay::new(CountingDisplay::default());
        let mut other = shared.clone();
        shared.with_mut(|_| {
            other.refresh_cleanup(10, 10);
        });
        assert_eq!(shared.with(|d| d.calls), Some(0));
    }
}
