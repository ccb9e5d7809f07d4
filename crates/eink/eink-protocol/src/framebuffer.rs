//! mxcfb framebuffer driver
//!
//! Opens the EPDC framebuffer node once and translates the scenario calls of
//! [`DisplayProtocol`] into `MXCFB_SEND_UPDATE` requests.
//!
//! # Failure model
//!
//! Nothing here is fatal. If the node cannot be opened the driver runs
//! *detached*: counters and timing still advance, but no update reaches the
//! panel. A failed ioctl is logged with the OS error and dropped; the next
//! call is attempted independently.
//!
//! # Protocol per call
//!
//! ```text
//! fill descriptor (region, waveform, mode, temp, marker+1)
//!   → ioctl(SEND_UPDATE)
//!   → [Completion::Wait only] ioctl(WAIT_FOR_UPDATE_COMPLETE, marker)
//! ```

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::clock::{Clock, MonotonicClock};
use crate::counters::{RefreshClass, RefreshCounters};
use crate::mxcfb::{
    MxcfbUpdateData, MxcfbUpdateMarkerData, MXCFB_SEND_UPDATE, MXCFB_WAIT_FOR_UPDATE_COMPLETE,
};
use crate::protocol::DisplayProtocol;
use crate::region::Region;
use crate::waveform_mode::{UpdateMode, WaveformMode};

/// Errors raised while bringing the framebuffer node up.
///
/// These never escape [`FramebufferDisplay::open`]; they are logged and the
/// driver falls back to detached mode.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The node path contains an interior NUL byte.
    #[error("device path {0:?} contains a NUL byte")]
    InvalidPath(PathBuf),
    /// `mknod` for the missing node failed.
    #[error("mknod {path:?} failed: {source}")]
    CreateNode {
        /// Node path
        path: PathBuf,
        /// OS error
        source: io::Error,
    },
    /// Opening the node read-write failed.
    #[error("open {path:?} failed: {source}")]
    Open {
        /// Node path
        path: PathBuf,
        /// OS error
        source: io::Error,
    },
}

/// Whether a call blocks until the panel reports the update as displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Queue the update and return.
    Async,
    /// Queue the update, then wait on its marker.
    Wait,
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Framebuffer node path
    pub device_path: PathBuf,
    /// Major number used when the node has to be created
    pub device_major: u32,
    /// Minor number used when the node has to be created
    pub device_minor: u32,
    /// Partial updates allowed before [`DisplayProtocol::needs_cleanup`] reports true
    pub max_partial_before_cleanup: u32,
    /// A2 updates allowed before [`DisplayProtocol::needs_cleanup`] reports true
    pub max_a2_before_cleanup: u32,
    /// Scroll calls closer together than this use A2 instead of GL16 (ms)
    pub fast_scroll_threshold_ms: u64,
}

impl DriverConfig {
    /// Scroll threshold as a [`Duration`].
    pub fn fast_scroll_threshold(&self) -> Duration {
        Duration::from_millis(self.fast_scroll_threshold_ms)
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from("/dev/fb0"),
            device_major: 29,
            device_minor: 0,
            max_partial_before_cleanup: RefreshCounters::DEFAULT_MAX,
            max_a2_before_cleanup: RefreshCounters::DEFAULT_MAX,
            fast_scroll_threshold_ms: 200,
        }
    }
}

/// mxcfb framebuffer display driver.
pub struct FramebufferDisplay<C: Clock = MonotonicClock> {
    device: Option<File>,
    config: DriverConfig,
    clock: C,
    marker: u32,
    counters: RefreshCounters,
    last_scroll: Instant,
}

impl FramebufferDisplay<MonotonicClock> {
    /// Open the framebuffer node described by `config`.
    ///
    /// Never fails: if the node is unusable the driver comes up detached.
    pub fn open(config: DriverConfig) -> Self {
        Self::open_with_clock(config, MonotonicClock)
    }
}

impl<C: Clock> FramebufferDisplay<C> {
    /// Open the framebuffer node with a custom clock.
    pub fn open_with_clock(config: DriverConfig, clock: C) -> Self {
        if let Err(e) = ensure_device_node(&config) {
            tracing::warn!(error = %e, "framebuffer node not available");
        }
        let device = match open_device(&config.device_path) {
            Ok(file) => {
                tracing::info!(path = %config.device_path.display(), "framebuffer opened, smart refresh enabled");
                Some(file)
            }
            Err(e) => {
                tracing::warn!(error = %e, "framebuffer open failed, refreshes disabled");
                None
            }
        };
        Self::with_device(device, config, clock)
    }

    /// Driver with no device attached. Every update is a no-op sink.
    pub fn detached(config: DriverConfig, clock: C) -> Self {
        Self::with_device(None, config, clock)
    }

    fn with_device(device: Option<File>, config: DriverConfig, clock: C) -> Self {
        let counters = RefreshCounters::with_maxima(
            config.max_partial_before_cleanup,
            config.max_a2_before_cleanup,
        );
        let last_scroll = clock.now();
        Self {
            device,
            config,
            clock,
            marker: 0,
            counters,
            last_scroll,
        }
    }

    /// True when a device handle is open.
    pub fn is_attached(&self) -> bool {
        self.device.is_some()
    }

    /// Partial updates since the last full/cleanup refresh.
    pub fn partial_count(&self) -> u32 {
        self.counters.partial_count()
    }

    /// A2 updates since the last full/cleanup refresh.
    pub fn a2_count(&self) -> u32 {
        self.counters.fast_count()
    }

    /// Marker of the most recently submitted update (0 if none).
    pub fn last_marker(&self) -> u32 {
        self.marker
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Cleanup refresh that blocks until the panel has finished drawing.
    ///
    /// Used by the manual full-refresh escape hatch, which must not hand the
    /// screen back before the INIT pass is visible.
    pub fn refresh_cleanup_and_wait(&mut self, width: u32, height: u32) {
        tracing::info!("cleanup refresh (INIT FULL, waited)");
        self.trigger_region(
            Region::full_screen(width, height),
            WaveformMode::Init,
            UpdateMode::Full,
            Completion::Wait,
        );
        self.counters.record(RefreshClass::Full);
    }

    fn trigger_region(
        &mut self,
        region: Region,
        waveform: WaveformMode,
        mode: UpdateMode,
        completion: Completion,
    ) {
        let Some(device) = self.device.as_ref() else {
            return;
        };

        self.marker = self.marker.wrapping_add(1);
        let mut update = MxcfbUpdateData::new(region, waveform, mode, self.marker);

        if let Err(e) = send_update(device, &mut update) {
            tracing::warn!(error = %e, waveform = waveform.name(), "send update failed");
            return;
        }

        if completion == Completion::Wait {
            let mut marker = MxcfbUpdateMarkerData {
                update_marker: update.update_marker,
                collision_test: 0,
            };
            if let Err(e) = wait_for_update(device, &mut marker) {
                tracing::warn!(error = %e, marker = update.update_marker, "wait for update failed");
            }
        }

        tracing::debug!(
            waveform = waveform.name(),
            mode = mode.name(),
            region = %region,
            marker = update.update_marker,
            waited = completion == Completion::Wait,
            "update submitted"
        );
    }
}

impl<C: Clock> DisplayProtocol for FramebufferDisplay<C> {
    fn refresh_full(&mut self, width: u32, height: u32) {
        tracing::debug!(width, height, "full refresh (GC16 FULL)");
        self.trigger_region(
            Region::full_screen(width, height),
            WaveformMode::GC16,
            UpdateMode::Full,
            Completion::Async,
        );
        self.counters.record(RefreshClass::Full);
    }

    fn refresh_partial(&mut self, region: Region) {
        tracing::debug!(region = %region, "partial refresh (GL16)");
        self.trigger_region(region, WaveformMode::GL16, UpdateMode::Partial, Completion::Async);
        self.counters.record(RefreshClass::Partial);
    }

    fn refresh_ui(&mut self, region: Region) {
        tracing::debug!(region = %region, "UI refresh (DU)");
        self.trigger_region(region, WaveformMode::DU, UpdateMode::Partial, Completion::Async);
        self.counters.record(RefreshClass::Partial);
    }

    fn refresh_a2(&mut self, region: Region) {
        tracing::debug!(region = %region, "A2 refresh (fast scroll)");
        self.trigger_region(region, WaveformMode::A2, UpdateMode::Partial, Completion::Async);
        self.counters.record(RefreshClass::Fast);
    }

    fn refresh_scroll(&mut self, width: u32, height: u32) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(self.last_scroll);
        self.last_scroll = now;

        let region = Region::full_screen(width, height);
        if elapsed < self.config.fast_scroll_threshold() {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "fast scroll (A2)");
            self.trigger_region(region, WaveformMode::A2, UpdateMode::Partial, Completion::Async);
            self.counters.record(RefreshClass::Fast);
        } else {
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "settled scroll (GL16)");
            self.trigger_region(region, WaveformMode::GL16, UpdateMode::Partial, Completion::Async);
            self.counters.record(RefreshClass::Partial);
        }
    }

    fn refresh_cleanup(&mut self, width: u32, height: u32) {
        tracing::info!("cleanup refresh (INIT FULL) clearing ghosting");
        self.trigger_region(
            Region::full_screen(width, height),
            WaveformMode::Init,
            UpdateMode::Full,
            Completion::Async,
        );
        self.counters.record(RefreshClass::Full);
    }

    fn needs_cleanup(&self) -> bool {
        self.counters.needs_cleanup()
    }
}

/// Make sure a character device exists at the configured path.
///
/// Some images boot without the framebuffer node populated. A missing node is
/// created with the configured major/minor and mode 0666.
pub fn ensure_device_node(config: &DriverConfig) -> Result<(), DeviceError> {
    let path = config.device_path.as_path();
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.file_type().is_char_device() {
            return Ok(());
        }
    }

    let c_path = std::ffi::CString::new(path.as_os_str().as_bytes())
        .map_err(|_| DeviceError::InvalidPath(path.to_path_buf()))?;
    // SAFETY: `c_path` is a valid NUL-terminated string that outlives the
    // call; mknod does not retain the pointer.
    let rc = unsafe {
        let dev = libc::makedev(config.device_major, config.device_minor);
        libc::mknod(c_path.as_ptr(), libc::S_IFCHR | 0o666, dev)
    };
    if rc != 0 {
        return Err(DeviceError::CreateNode {
            path: path.to_path_buf(),
            source: io::Error::last_os_error(),
        });
    }

    // mknod is filtered by the umask; widen to 0666 explicitly.
    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o666)) {
        tracing::warn!(error = %e, "chmod of created framebuffer node failed");
    }
    tracing::info!(path = %path.display(), "created framebuffer node");
    Ok(())
}

fn open_device(path: &Path) -> Result<File, DeviceError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|source| DeviceError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn send_update(device: &File, update: &mut MxcfbUpdateData) -> io::Result<()> {
    // SAFETY: `update` is a live, exclusively borrowed #[repr(C)] struct whose
    // size matches the size encoded in MXCFB_SEND_UPDATE.
    let rc = unsafe {
        libc::ioctl(
            device.as_raw_fd(),
            MXCFB_SEND_UPDATE as _,
            update as *mut MxcfbUpdateData,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn wait_for_update(device: &File, marker: &mut MxcfbUpdateMarkerData) -> io::Result<()> {
    // SAFETY: `marker` is a live, exclusively borrowed #[repr(C)] struct whose
    // size matches the size encoded in MXCFB_WAIT_FOR_UPDATE_COMPLETE. The
    // driver writes `collision_test` back into it.
    let rc = unsafe {
        libc::ioctl(
            device.as_raw_fd(),
            MXCFB_WAIT_FOR_UPDATE_COMPLETE as _,
            marker as *mut MxcfbUpdateMarkerData,
        )
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached() -> FramebufferDisplay {
        FramebufferDisplay::detached(DriverConfig::default(), MonotonicClock)
    }

    #[test]
    fn test_detached_driver_is_a_silent_sink() {
        let mut fb = detached();
        assert!(!fb.is_attached());
        fb.refresh_partial(Region::new(0, 0, 10, 10));
        fb.refresh_full(954, 1696);
        assert_eq!(fb.last_marker(), 0);
    }

    #[test]
    fn test_counters_follow_scenarios() {
        let mut fb = detached();
        fb.refresh_partial(Region::new(0, 0, 10, 10));
        fb.refresh_ui(Region::new(0, 0, 10, 10));
        fb.refresh_a2(Region::new(0, 0, 10, 10));
        assert_eq!(fb.partial_count(), 2);
        assert_eq!(fb.a2_count(), 1);

        fb.refresh_cleanup(954, 1696);
        assert_eq!(fb.partial_count(), 0);
        assert_eq!(fb.a2_count(), 0);
    }

    #[test]
    fn test_needs_cleanup_at_configured_maximum() {
        let config = DriverConfig {
            max_partial_before_cleanup: 2,
            ..DriverConfig::default()
        };
        let mut fb = FramebufferDisplay::detached(config, MonotonicClock);
        fb.refresh_ui(Region::new(0, 0, 1, 1));
        assert!(!fb.needs_cleanup());
        fb.refresh_ui(Region::new(0, 0, 1, 1));
        assert!(fb.needs_cleanup());
        fb.refresh_full(1, 1);
        assert!(!fb.needs_cleanup());
    }

    #[test]
    fn test_default_config() {
        let config = DriverConfig::default();
        assert_eq!(config.device_path, PathBuf::from("/dev/fb0"));
        assert_eq!(config.device_major, 29);
        assert_eq!(config.max_partial_before_cleanup, 10);
        assert_eq!(config.max_a2_before_cleanup, 10);
        assert_eq!(config.fast_scroll_threshold(), Duration::from_millis(200));
    }
}
