// src/config.rs - Runtime configuration
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    /// Number of stable player slots exposed to readers
    #[serde(default = "default_max_players")]
    pub max_players: u8,
}

/// Display space the normalizer projects into.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// How long `start()` waits for the skeleton stream
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
    /// Longest single wait for a frame before the stop flag is checked again
    #[serde(default = "default_frame_wait_ms")]
    pub frame_wait_ms: u64,
}

fn default_max_players() -> u8 { 2 }
fn default_width() -> u32 { 480 }
fn default_height() -> u32 { 360 }
fn default_ready_timeout_ms() -> u64 { 10_000 }
fn default_frame_wait_ms() -> u64 { 100 }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_players: default_max_players() }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            ready_timeout_ms: default_ready_timeout_ms(),
            frame_wait_ms: default_frame_wait_ms(),
        }
    }
}

impl SensorConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn frame_wait(&self) -> Duration {
        Duration::from_millis(self.frame_wait_ms)
    }
}

impl AppConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tracker.max_players == 0 {
            bail!("tracker.max_players must be at least 1");
        }
        if self.display.width == 0 || self.display.height == 0 {
            bail!("display width and height must be non-zero");
        }
        if self.sensor.frame_wait_ms == 0 {
            bail!("sensor.frame_wait_ms must be non-zero");
        }
        Ok(())
    }
}
