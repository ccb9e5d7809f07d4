//! Update regions in device pixels

/// Rectangle addressed by a single panel update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Region {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Region {
    /// Create a region from its top-left corner and size.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Region covering a whole `width × height` screen.
    pub const fn full_screen(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// True when the region addresses no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the region spans at least `fraction` of both screen
    /// dimensions. A `fraction` of 1.0 means the whole screen.
    // SAFETY: f32 products of screen dimensions and a fraction cannot overflow.
    #[allow(clippy::arithmetic_side_effects, clippy::cast_precision_loss)]
    pub fn covers(&self, width: u32, height: u32, fraction: f32) -> bool {
        self.width as f32 >= width as f32 * fraction && self.height as f32 >= height as f32 * fraction
    }
}

impl core::fmt::Display for Region {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{},{} {}x{}", self.x, self.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coverage_fraction() {
        assert!(Region::full_screen(954, 1696).covers(954, 1696, 1.0));
        assert!(!Region::new(0, 0, 953, 1696).covers(954, 1696, 1.0));

        // 80% of 954x1696 is 763.2x1356.8
        assert!(Region::new(10, 10, 764, 1357).covers(954, 1696, 0.8));
        assert!(!Region::new(10, 10, 763, 1696).covers(954, 1696, 0.8));
        assert!(!Region::new(10, 10, 954, 1356).covers(954, 1696, 0.8));
    }

    #[test]
    fn test_empty_region() {
        assert!(Region::new(5, 5, 0, 10).is_empty());
        assert!(!Region::new(5, 5, 1, 1).is_empty());
    }

    #[test]
    fn test_display_format() {
        assert_eq!(Region::new(1, 2, 3, 4).to_string(), "1,2 3x4");
    }
}
