//! Per-engine diagnostics
//!
//! Counters only ever grow. They exist so that a surface that stops
//! refreshing (e.g. the reading policy holding back every small edit) can be
//! told apart from a surface that receives no events at all.

use core::fmt;

/// Running totals for one engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    /// Events accepted by `push_event`
    pub events_pushed: u64,
    /// Non-empty batches decided
    pub batches_processed: u64,
    /// Batches that dispatched a refresh
    pub refreshes_dispatched: u64,
    /// Batches vetoed by the reading-policy score gate
    pub anti_thrash_skips: u64,
    /// Decisions overridden to a full refresh by the cleanup valve
    pub forced_cleanups: u64,
    /// Producer payloads rejected as malformed
    pub malformed_payloads: u64,
    /// Refreshes issued by post-click series
    pub post_click_refreshes: u64,
    /// Trace-driven repaints issued on a self-repainting surface
    pub repaints: u64,
    /// Trace-driven repaints dropped by the throttle
    pub throttled_repaints: u64,
}

impl RefreshStats {
    pub(crate) fn bump(counter: &mut u64) {
        *counter = counter.saturating_add(1);
    }
}

impl fmt::Display for RefreshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "events={} batches={} refreshes={} skips={} forced={} malformed={} post_click={} repaints={} throttled={}",
            self.events_pushed,
            self.batches_processed,
            self.refreshes_dispatched,
            self.anti_thrash_skips,
            self.forced_cleanups,
            self.malformed_payloads,
            self.post_click_refreshes,
            self.repaints,
            self.throttled_repaints,
        )
    }
}
