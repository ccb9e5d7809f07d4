//! mxcfb ioctl descriptors
//!
//! Binary layout of the i.MX EPDC framebuffer update interface
//! (`linux/mxcfb.h`). These structs are read by the kernel driver, so field
//! order, sizes and padding must match the header exactly.
//!
//! Two requests are used:
//!
//! - `MXCFB_SEND_UPDATE` (write, 72 bytes): queue an update for a region
//! - `MXCFB_WAIT_FOR_UPDATE_COMPLETE` (read/write, 8 bytes): block until the
//!   update tagged with a marker has been displayed

use crate::region::Region;
use crate::waveform_mode::{UpdateMode, WaveformMode};

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

/// Encode an ioctl request number the way the Linux `_IOC` macro does.
// SAFETY: every component is masked to its field width before shifting, so
// no shift or OR can overflow a u32.
#[allow(clippy::arithmetic_side_effects, clippy::cast_possible_truncation)]
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    ((dir & 0x3) << 30) | (((size as u32) & 0x3FFF) << 16) | ((ty as u32) << 8) | (nr as u32)
}

/// `_IOW('F', 0x2E, struct mxcfb_update_data)`
pub const MXCFB_SEND_UPDATE: u32 =
    ioc(IOC_WRITE, b'F', 0x2E, core::mem::size_of::<MxcfbUpdateData>());

/// `_IOWR('F', 0x2F, struct mxcfb_update_marker_data)`
pub const MXCFB_WAIT_FOR_UPDATE_COMPLETE: u32 = ioc(
    IOC_READ | IOC_WRITE,
    b'F',
    0x2F,
    core::mem::size_of::<MxcfbUpdateMarkerData>(),
);

/// `temp` value asking the controller to use its ambient temperature sensor.
pub const TEMP_USE_AMBIENT: i32 = 0x1000;

/// Fixed `temp` value used with the DU waveform on this panel family.
pub const TEMP_USE_REMARKABLE_DRAW: i32 = 0x0018;

/// `struct mxcfb_rect`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MxcfbRect {
    /// Top edge
    pub top: u32,
    /// Left edge
    pub left: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl From<Region> for MxcfbRect {
    fn from(r: Region) -> Self {
        Self {
            top: r.y,
            left: r.x,
            width: r.width,
            height: r.height,
        }
    }
}

/// `struct mxcfb_alt_buffer_data`
///
/// Unused by this driver (always zeroed) but part of the descriptor layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MxcfbAltBufferData {
    /// Physical address of the alternate buffer
    pub phys_addr: u32,
    /// Alternate buffer width
    pub width: u32,
    /// Alternate buffer height
    pub height: u32,
    /// Alternate buffer stride
    pub stride: u32,
    /// Alternate buffer pixel format
    pub pixel_fmt: u32,
    /// Region of the alternate buffer to use
    pub alt_update_region: MxcfbRect,
}

/// `struct mxcfb_update_data`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MxcfbUpdateData {
    /// Region to update
    pub update_region: MxcfbRect,
    /// Raw [`WaveformMode`] value
    pub waveform_mode: u32,
    /// Raw [`UpdateMode`] value
    pub update_mode: u32,
    /// Caller-chosen tag used to wait for completion
    pub update_marker: u32,
    /// Temperature hint
    pub temp: i32,
    /// Update flags (none used)
    pub flags: u32,
    /// Alternate buffer description
    pub alt_buffer_data: MxcfbAltBufferData,
}

impl MxcfbUpdateData {
    /// Build a descriptor for one update.
    ///
    /// The DU waveform runs with a fixed temperature value; every other
    /// waveform asks the controller to read its sensor.
    pub fn new(region: Region, waveform: WaveformMode, mode: UpdateMode, marker: u32) -> Self {
        let temp = if waveform == WaveformMode::DU {
            TEMP_USE_REMARKABLE_DRAW
        } else {
            TEMP_USE_AMBIENT
        };
        Self {
            update_region: region.into(),
            waveform_mode: waveform.raw(),
            update_mode: mode.raw(),
            update_marker: marker,
            temp,
            flags: 0,
            alt_buffer_data: MxcfbAltBufferData::default(),
        }
    }
}

/// `struct mxcfb_update_marker_data`
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MxcfbUpdateMarkerData {
    /// Marker of the update to wait for
    pub update_marker: u32,
    /// Set by the driver when a collision was detected
    pub collision_test: u32,
}

const _: () = assert!(core::mem::size_of::<MxcfbRect>() == 16);
const _: () = assert!(core::mem::size_of::<MxcfbAltBufferData>() == 36);
const _: () = assert!(core::mem::size_of::<MxcfbUpdateData>() == 72);
const _: () = assert!(core::mem::size_of::<MxcfbUpdateMarkerData>() == 8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_codes_match_kernel_header() {
        assert_eq!(MXCFB_SEND_UPDATE, 0x4048_462E);
        assert_eq!(MXCFB_WAIT_FOR_UPDATE_COMPLETE, 0xC008_462F);
    }

    #[test]
    fn test_descriptor_fields() {
        let d = MxcfbUpdateData::new(
            Region::new(10, 20, 300, 400),
            WaveformMode::GL16,
            UpdateMode::Partial,
            7,
        );
        assert_eq!(d.update_region.left, 10);
        assert_eq!(d.update_region.top, 20);
        assert_eq!(d.update_region.width, 300);
        assert_eq!(d.update_region.height, 400);
        assert_eq!(d.waveform_mode, 3);
        assert_eq!(d.update_mode, 0);
        assert_eq!(d.update_marker, 7);
        assert_eq!(d.temp, TEMP_USE_AMBIENT);
        assert_eq!(d.flags, 0);
    }

    #[test]
    fn test_du_uses_fixed_temperature() {
        let d = MxcfbUpdateData::new(
            Region::full_screen(954, 1696),
            WaveformMode::DU,
            UpdateMode::Partial,
            1,
        );
        assert_eq!(d.temp, TEMP_USE_REMARKABLE_DRAW);
    }
}
