//! Engine tuning
//!
//! Every knob has a default; a config file only needs to name what it
//! changes.

use std::time::Duration;

use serde::Deserialize;

/// Score tiers for [`PolicyMode::ReadingFirst`](crate::PolicyMode::ReadingFirst).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReadingThresholds {
    /// metric above this → GC16 partial
    pub partial: i32,
    /// metric above this → DU
    pub du: i32,
}

impl Default for ReadingThresholds {
    fn default() -> Self {
        Self {
            partial: 100,
            du: 10,
        }
    }
}

/// Score tiers for [`PolicyMode::InteractionFirst`](crate::PolicyMode::InteractionFirst).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct InteractionThresholds {
    /// scroll delta above this → DU
    pub scroll_du: i32,
    /// score above this → GL16
    pub gl16: i32,
    /// score above this → DU
    pub du: i32,
}

impl Default for InteractionThresholds {
    fn default() -> Self {
        Self {
            scroll_du: 50,
            gl16: 100,
            du: 20,
        }
    }
}

/// Score tiers for [`PolicyMode::Balanced`](crate::PolicyMode::Balanced).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct BalancedThresholds {
    /// scroll delta above this → A2/GL16 depending on activity
    pub scroll: i32,
    /// risk-adjusted score above this → GC16 partial
    pub partial: i32,
    /// risk-adjusted score above this → GL16
    pub gl16: i32,
    /// risk-adjusted score above this → A2
    pub a2: i32,
}

impl Default for BalancedThresholds {
    fn default() -> Self {
        Self {
            scroll: 200,
            partial: 300,
            gl16: 80,
            a2: 10,
        }
    }
}

/// Trace-driven repaints on self-repainting surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepaintConfig {
    /// Minimum gap between throttled repaints (ms)
    pub throttle_ms: u64,
    /// Delay between a scroll/idle/mutation note and its repaint (ms)
    pub delay_ms: u64,
    /// Repaints in the follow-up series after a scroll note
    pub series_repeats: u32,
    /// Gap before and between follow-up repaints (ms)
    pub series_interval_ms: u64,
}

impl Default for RepaintConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 250,
            delay_ms: 50,
            series_repeats: 5,
            series_interval_ms: 1_000,
        }
    }
}

impl RepaintConfig {
    /// Throttle window
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Note-to-repaint delay
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Follow-up series interval
    pub fn series_interval(&self) -> Duration {
        Duration::from_millis(self.series_interval_ms)
    }
}

/// Refresh engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Batch window, measured from the first event of a batch (ms)
    pub batch_window_ms: u64,
    /// Inactivity before an idle check (ms)
    pub idle_timeout_ms: u64,
    /// Minimum gap between load-triggered full refreshes (ms)
    pub full_refresh_min_interval_ms: u64,
    /// Refreshes closer than this count as continuous scrolling (ms)
    pub scroll_activity_ms: u64,
    /// GC16 partial/GL16 refreshes before a forced full refresh
    pub max_partial_before_cleanup: u32,
    /// DU refreshes before a forced full refresh
    pub max_du_before_cleanup: u32,
    /// Ghosting risk that forces a full refresh
    pub ghosting_cleanup_threshold: f32,
    /// Ghosting risk above which an idle check requests a full refresh
    pub idle_cleanup_threshold: f32,
    /// Ghosting risk above which a burst end gets a full refresh
    pub burst_full_threshold: f32,
    /// Score a second post-click refresh must exceed
    pub supplemental_score_threshold: i32,
    /// Refreshes in one post-click series
    pub post_click_repeats: u32,
    /// Gap before and between post-click refreshes (ms)
    pub post_click_interval_ms: u64,
    /// Padding added around merged dirty regions (px)
    pub region_padding: i32,
    /// Fraction of both screen dimensions above which a region is treated
    /// as full screen
    pub full_screen_coverage: f32,
    /// ReadingFirst tiers
    pub reading: ReadingThresholds,
    /// InteractionFirst tiers
    pub interaction: InteractionThresholds,
    /// Balanced tiers
    pub balanced: BalancedThresholds,
    /// Self-repainting surface timings
    pub repaint: RepaintConfig,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            batch_window_ms: 200,
            idle_timeout_ms: 60_000,
            full_refresh_min_interval_ms: 5_000,
            scroll_activity_ms: 200,
            max_partial_before_cleanup: 10,
            max_du_before_cleanup: 10,
            ghosting_cleanup_threshold: 3.0,
            idle_cleanup_threshold: 5.0,
            burst_full_threshold: 0.5,
            supplemental_score_threshold: 20,
            post_click_repeats: 3,
            post_click_interval_ms: 1_000,
            region_padding: 10,
            full_screen_coverage: 0.8,
            reading: ReadingThresholds::default(),
            interaction: InteractionThresholds::default(),
            balanced: BalancedThresholds::default(),
            repaint: RepaintConfig::default(),
        }
    }
}

impl RefreshConfig {
    /// Batch window
    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }

    /// Idle timeout
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Minimum gap between load-triggered full refreshes
    pub fn full_refresh_min_interval(&self) -> Duration {
        Duration::from_millis(self.full_refresh_min_interval_ms)
    }

    /// Scroll activity window
    pub fn scroll_activity(&self) -> Duration {
        Duration::from_millis(self.scroll_activity_ms)
    }

    /// Post-click interval
    pub fn post_click_interval(&self) -> Duration {
        Duration::from_millis(self.post_click_interval_ms)
    }
}
