// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::CameraBackendType;
use crate::constants::{EncodingQuality, FacingMode, capture, endpoints, timing};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config dir
const CONFIG_DIR_NAME: &str = "skin-scanner";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local analysis endpoint
    pub primary_url: String,
    /// Hosted endpoint tried after the primary fails
    pub fallback_url: String,
    /// History service receiving results of signed-in users
    pub history_url: String,
    /// Preferred stream width
    pub preferred_width: u32,
    /// Preferred stream height
    pub preferred_height: u32,
    /// Which way the camera should face
    pub facing: FacingMode,
    /// JPEG quality of the scan payload
    pub encoding_quality: EncodingQuality,
    /// Pause between primary success and completion, in milliseconds
    pub completion_grace_ms: u64,
    /// Per-request timeout for analysis calls (None waits forever)
    pub request_timeout_secs: Option<u64>,
    /// Overlay redraw rate
    pub overlay_fps: u32,
    /// Mirror camera preview horizontally (selfie mode)
    pub mirror_preview: bool,
    /// Camera backend to use
    pub backend: CameraBackendType,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            primary_url: endpoints::PRIMARY_URL.to_string(),
            fallback_url: endpoints::FALLBACK_URL.to_string(),
            history_url: endpoints::HISTORY_URL.to_string(),
            preferred_width: capture::PREFERRED_WIDTH,
            preferred_height: capture::PREFERRED_HEIGHT,
            facing: FacingMode::Front,
            encoding_quality: EncodingQuality::Medium,
            completion_grace_ms: timing::COMPLETION_GRACE.as_millis() as u64,
            request_timeout_secs: Some(timing::REQUEST_TIMEOUT_SECS),
            overlay_fps: timing::OVERLAY_FPS,
            mirror_preview: true, // Default to mirrored (selfie mode)
            backend: CameraBackendType::default(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from a specific file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Save to a specific file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Pause between primary success and completion
    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }

    /// Per-request timeout for analysis calls
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Interval between overlay redraws, never shorter than 1µs
    pub fn overlay_interval(&self) -> Duration {
        let fps = self.overlay_fps.max(1);
        Duration::from_micros((1_000_000 / fps as u64).max(1))
    }
}
