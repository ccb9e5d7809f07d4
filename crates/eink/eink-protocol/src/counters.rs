//! Cleanup counters kept by the display driver
//!
//! Ghosting builds up with every non-flashing update. The driver counts
//! partial and fast updates since the last full-screen pass and reports when
//! either count reaches its configured maximum.

/// Class of update as seen by the cleanup counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshClass {
    /// Full-screen flashing update (GC16 full or INIT). Resets both counters.
    Full,
    /// Region update with a grayscale or direct-update waveform.
    Partial,
    /// Binary animation waveform (A2).
    Fast,
}

/// Partial/fast update counters since the last full refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCounters {
    partial_count: u32,
    fast_count: u32,
    max_partial: u32,
    max_fast: u32,
}

impl RefreshCounters {
    /// Default maximum for either counter before cleanup is recommended.
    pub const DEFAULT_MAX: u32 = 10;

    /// Counters with the default maxima (10 partial, 10 fast).
    pub fn new() -> Self {
        Self::with_maxima(Self::DEFAULT_MAX, Self::DEFAULT_MAX)
    }

    /// Counters with custom maxima.
    pub fn with_maxima(max_partial: u32, max_fast: u32) -> Self {
        Self {
            partial_count: 0,
            fast_count: 0,
            max_partial,
            max_fast,
        }
    }

    /// Partial updates since the last full refresh.
    pub fn partial_count(&self) -> u32 {
        self.partial_count
    }

    /// Fast (A2) updates since the last full refresh.
    pub fn fast_count(&self) -> u32 {
        self.fast_count
    }

    /// True once either counter has reached its maximum.
    pub fn needs_cleanup(&self) -> bool {
        self.partial_count >= self.max_partial || self.fast_count >= self.max_fast
    }

    /// Account for one executed update.
    pub fn record(&mut self, class: RefreshClass) {
        match class {
            RefreshClass::Full => self.reset(),
            RefreshClass::Partial => self.partial_count = self.partial_count.saturating_add(1),
            RefreshClass::Fast => self.fast_count = self.fast_count.saturating_add(1),
        }
    }

    /// Zero both counters.
    pub fn reset(&mut self) {
        self.partial_count = 0;
        self.fast_count = 0;
    }
}

impl Default for RefreshCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_after_max_partial() {
        let mut c = RefreshCounters::with_maxima(3, 10);
        c.record(RefreshClass::Partial);
        c.record(RefreshClass::Partial);
        assert!(!c.needs_cleanup());
        c.record(RefreshClass::Partial);
        assert!(c.needs_cleanup());

        c.record(RefreshClass::Full);
        assert_eq!(c.partial_count(), 0);
        assert!(!c.needs_cleanup());
    }

    #[test]
    fn test_fast_counted_separately() {
        let mut c = RefreshCounters::new();
        for _ in 0..9 {
            c.record(RefreshClass::Fast);
        }
        assert_eq!(c.partial_count(), 0);
        assert_eq!(c.fast_count(), 9);
        assert!(!c.needs_cleanup());
        c.record(RefreshClass::Fast);
        assert!(c.needs_cleanup());
    }
}
