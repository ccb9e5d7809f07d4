//! Policy modes and waveform decisions

use core::fmt;

use serde::Deserialize;

/// Scoring policy for one surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Book-like surfaces. Refreshes must earn their keep; small edits after
    /// the first refresh are held back until they outgrow the last one.
    ReadingFirst,
    /// Browsing surfaces. Favours quick DU/GL16 feedback for scrolling and
    /// larger content changes.
    InteractionFirst,
    /// Neither of the above. Scores are amplified by accumulated ghosting.
    #[default]
    Balanced,
}

impl PolicyMode {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            PolicyMode::ReadingFirst => "reading_first",
            PolicyMode::InteractionFirst => "interaction_first",
            PolicyMode::Balanced => "balanced",
        }
    }
}

/// Outcome of one batch decision.
///
/// Each choice maps to exactly one driver scenario call when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveformChoice {
    /// Skip the refresh
    None,
    /// Binary fast waveform, full screen
    A2,
    /// Direct update, full screen
    DU,
    /// Grayscale waveform via the driver's adaptive scroll path
    GL16,
    /// High-quality partial update of the merged dirty region
    GC16Partial,
    /// Full-screen flashing refresh; clears ghosting
    GC16Full,
}

impl WaveformChoice {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            WaveformChoice::None => "NONE",
            WaveformChoice::A2 => "A2",
            WaveformChoice::DU => "DU",
            WaveformChoice::GL16 => "GL16",
            WaveformChoice::GC16Partial => "GC16_PARTIAL",
            WaveformChoice::GC16Full => "GC16_FULL",
        }
    }

    /// True for [`WaveformChoice::GC16Full`].
    pub fn is_full(&self) -> bool {
        *self == WaveformChoice::GC16Full
    }

    /// Ghosting risk added by executing this choice.
    ///
    /// A full refresh resets the risk instead, so it reports 0.
    pub fn ghosting_increment(&self) -> f32 {
        match self {
            WaveformChoice::None | WaveformChoice::GC16Full => 0.0,
            WaveformChoice::GC16Partial => 0.02,
            WaveformChoice::GL16 => 0.03,
            WaveformChoice::A2 => 0.05,
            WaveformChoice::DU => 0.01,
        }
    }
}

impl fmt::Display for WaveformChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_waveforms_cost_more() {
        assert!(WaveformChoice::A2.ghosting_increment() > WaveformChoice::GL16.ghosting_increment());
        assert!(WaveformChoice::GL16.ghosting_increment() > WaveformChoice::GC16Partial.ghosting_increment());
        assert!(WaveformChoice::GC16Partial.ghosting_increment() > WaveformChoice::DU.ghosting_increment());
        assert_eq!(WaveformChoice::GC16Full.ghosting_increment(), 0.0);
    }

    #[test]
    fn test_default_policy_is_balanced() {
        assert_eq!(PolicyMode::default(), PolicyMode::Balanced);
    }
}
