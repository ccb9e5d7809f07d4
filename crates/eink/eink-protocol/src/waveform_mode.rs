//! E-Ink Waveform Modes
//!
//! Waveform identifiers as understood by i.MX EPDC-family controllers (the
//! `mxcfb` kernel interface). Each mode trades refresh speed against
//! grayscale fidelity and ghosting.

/// Waveform modes accepted by the EPDC `send update` request.
///
/// The discriminants are the raw `waveform_mode` values written into the
/// update descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WaveformMode {
    /// INIT - panel initialization waveform
    ///
    /// - **Duration**: longest of all modes
    /// - **Flashing**: drives every pixel through black and white
    /// - **Ghosting**: erases all residual images
    /// - **Use case**: manual cleanup, recovering from heavy ghosting
    Init = 0,

    /// DU - Direct Update
    ///
    /// - **Grayscale**: 2 levels (black & white only)
    /// - **Duration**: ~260ms
    /// - **Flashing**: No flashing
    /// - **Ghosting**: Accumulates slowly
    /// - **Use case**: Menus, highlights, page turns on text
    DU = 1,

    /// GC16 - Grayscale Clearing 16-level
    ///
    /// - **Grayscale**: 16 levels (4-bit)
    /// - **Duration**: ~980ms
    /// - **Flashing**: Multiple flashes when run in full mode
    /// - **Ghosting**: Clears ghosting
    /// - **Use case**: Full refreshes, fresh page loads
    GC16 = 2,

    /// GL16 - Grayscale 16-level
    ///
    /// - **Grayscale**: 16 levels (4-bit)
    /// - **Duration**: ~980ms
    /// - **Flashing**: Reduced flash compared to GC16
    /// - **Use case**: Anti-aliased text on white background, region updates
    GL16 = 3,

    /// A2 - Animation Mode
    ///
    /// - **Grayscale**: 2 levels (black & white only)
    /// - **Duration**: ~120ms (ultra-fast)
    /// - **Ghosting**: High accumulation
    /// - **Use case**: Scrolling, rapid animation
    A2 = 4,
}

impl WaveformMode {
    /// Raw value for the descriptor's `waveform_mode` field.
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            WaveformMode::Init => "INIT",
            WaveformMode::DU => "DU",
            WaveformMode::GC16 => "GC16",
            WaveformMode::GL16 => "GL16",
            WaveformMode::A2 => "A2",
        }
    }

    /// Check if this mode clears accumulated ghosting
    pub fn clears_ghosting(&self) -> bool {
        matches!(self, WaveformMode::Init | WaveformMode::GC16)
    }
}

/// Update mode for the `update_mode` descriptor field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum UpdateMode {
    /// Only pixels that changed inside the region are driven.
    #[default]
    Partial = 0,
    /// Every pixel in the region is driven (flashing).
    Full = 1,
}

impl UpdateMode {
    /// Raw value for the descriptor's `update_mode` field.
    pub fn raw(self) -> u32 {
        self as u32
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            UpdateMode::Partial => "PARTIAL",
            UpdateMode::Full => "FULL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_values_match_driver_header() {
        assert_eq!(WaveformMode::Init.raw(), 0);
        assert_eq!(WaveformMode::DU.raw(), 1);
        assert_eq!(WaveformMode::GC16.raw(), 2);
        assert_eq!(WaveformMode::GL16.raw(), 3);
        assert_eq!(WaveformMode::A2.raw(), 4);
        assert_eq!(UpdateMode::Partial.raw(), 0);
        assert_eq!(UpdateMode::Full.raw(), 1);
    }

    #[test]
    fn test_only_flashing_modes_clear_ghosting() {
        assert!(WaveformMode::GC16.clears_ghosting());
        assert!(WaveformMode::Init.clears_ghosting());
        assert!(!WaveformMode::A2.clears_ghosting());
        assert!(!WaveformMode::DU.clears_ghosting());
        assert!(!WaveformMode::GL16.clears_ghosting());
    }
}
