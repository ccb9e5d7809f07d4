//! Shell configuration file

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use eink_protocol::DriverConfig;
use eink_refresh::RefreshConfig;
use serde::Deserialize;

/// Everything the shell needs at startup. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    /// Panel width in pixels
    pub width: u32,
    /// Panel height in pixels
    pub height: u32,
    /// Framebuffer driver settings
    pub device: DriverConfig,
    /// Engine tuning, shared by both surfaces
    pub refresh: RefreshConfig,
    /// Quiet period before the idle cleanup check (ms)
    pub cleanup_delay_ms: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            width: 954,
            height: 1696,
            device: DriverConfig::default(),
            refresh: RefreshConfig::default(),
            cleanup_delay_ms: 500,
        }
    }
}

impl ShellConfig {
    /// Load from a JSON file, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Idle cleanup delay
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }
}
