//! Configuration types for framebuffer capture.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::animation::CompressionType;
use crate::capture::{DEFAULT_DEVICE, ReadMode};
use crate::encode::StillFormat;

fn default_device() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE)
}

fn default_fps() -> f64 {
    10.0
}

fn default_frames() -> usize {
    50
}

/// Top-level capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Framebuffer device node.
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Capture rate for recordings, in frames per second.
    #[serde(default = "default_fps")]
    pub fps: f64,
    /// Number of frames per recording.
    #[serde(default = "default_frames")]
    pub frames: usize,
    /// Format for single screenshots.
    #[serde(default)]
    pub format: StillFormat,
    /// Frame compression for raw recordings.
    #[serde(default)]
    pub compression: CompressionType,
    /// How frames are read from the device.
    #[serde(default)]
    pub read_mode: ReadMode,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            fps: default_fps(),
            frames: default_frames(),
            format: StillFormat::default(),
            compression: CompressionType::default(),
            read_mode: ReadMode::default(),
        }
    }
}

impl CaptureConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(ConfigError::InvalidFrameRate(self.fps));
        }
        if self.frames == 0 {
            return Err(ConfigError::InvalidFrameCount);
        }
        if self.device.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDevice);
        }
        if !self.read_mode.is_available() {
            return Err(ConfigError::UnavailableReadMode(self.read_mode));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Frame rate must be positive and finite, got {0}")]
    InvalidFrameRate(f64),
    #[error("Frame count must be non-zero")]
    InvalidFrameCount,
    #[error("Device path must not be empty")]
    EmptyDevice,
    #[error("Read mode {0:?} is not available in this build")]
    UnavailableReadMode(ReadMode),
}
