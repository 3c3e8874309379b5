// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// JPEG quality presets for the scan payload
///
/// The analysis service is trained on moderately compressed camera images,
/// so the payload defaults to Medium (80).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncodingQuality {
    /// Low quality (high compression)
    Low,
    /// Medium quality (balanced, default)
    #[default]
    Medium,
    /// High quality (low compression)
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl EncodingQuality {
    /// All presets for UI iteration
    pub const ALL: [EncodingQuality; 4] = [
        EncodingQuality::Low,
        EncodingQuality::Medium,
        EncodingQuality::High,
        EncodingQuality::Maximum,
    ];

    /// Get JPEG quality value (0-100)
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }

    /// Get display name for the preset
    pub fn display_name(&self) -> &'static str {
        match self {
            EncodingQuality::Low => "Low",
            EncodingQuality::Medium => "Medium",
            EncodingQuality::High => "High",
            EncodingQuality::Maximum => "Maximum",
        }
    }
}

/// Requested camera facing direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// User-facing camera (selfie)
    #[default]
    Front,
    /// Environment-facing camera
    Back,
}

impl FacingMode {
    /// Location string used by device metadata ("front", "back")
    pub fn as_location(&self) -> &'static str {
        match self {
            FacingMode::Front => "front",
            FacingMode::Back => "back",
        }
    }
}

/// Analysis endpoint defaults
pub mod endpoints {
    /// Local analysis service
    pub const PRIMARY_URL: &str = "http://127.0.0.1:8000/predict";

    /// Hosted mock analysis, used when the local service fails
    pub const FALLBACK_URL: &str = "http://127.0.0.1:54321/functions/v1/predict-mock";

    /// Hosted history service
    pub const HISTORY_URL: &str = "http://127.0.0.1:54321/functions/v1/history";

    /// Action tag sent with history writes
    pub const HISTORY_SAVE_ACTION: &str = "save";

    /// MIME prefix of the image payload
    pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";
}

/// Capture constraints
pub mod capture {
    /// Preferred stream width
    pub const PREFERRED_WIDTH: u32 = 1280;

    /// Preferred stream height
    pub const PREFERRED_HEIGHT: u32 = 720;
}

/// Progress checkpoints of one capture attempt
pub mod progress {
    pub const CAPTURING: u8 = 0;
    pub const PREPARING: u8 = 20;
    pub const ANALYZING: u8 = 50;
    pub const COMPLETE: u8 = 100;

    pub const CAPTURING_STAGE: &str = "Capturing frame";
    pub const PREPARING_STAGE: &str = "Preparing image for analysis";
    pub const ANALYZING_STAGE: &str = "Analyzing skin features";
    pub const COMPLETE_STAGE: &str = "Analysis complete";
}

/// Overlay geometry and colours
pub mod overlay {
    /// Reticle horizontal radius as a fraction of surface width
    pub const RETICLE_RADIUS_X: f32 = 0.3;

    /// Reticle vertical radius as a fraction of surface height
    pub const RETICLE_RADIUS_Y: f32 = 0.4;

    /// Reticle stroke width in pixels
    pub const RETICLE_STROKE: f32 = 2.0;

    /// Length of each arm of a corner bracket
    pub const BRACKET_ARM: u32 = 20;

    /// Distance of each bracket corner from the surface edges
    pub const BRACKET_INSET: u32 = 40;

    /// Bracket line thickness in pixels
    pub const BRACKET_THICKNESS: u32 = 2;

    /// Scan band thickness in pixels
    pub const SCAN_BAND_HEIGHT: u32 = 2;

    /// Scan band advance per redraw in pixels
    pub const SCAN_BAND_STEP: u32 = 2;

    /// Accent colour for reticle and brackets (RGBA, translucent)
    pub const GUIDE_COLOR: [u8; 4] = [14, 165, 233, 128];

    /// Scan band colour (RGBA, translucent)
    pub const SCAN_BAND_COLOR: [u8; 4] = [14, 165, 233, 179];
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Pause after the primary result so the progress bar settles at 100%
    pub const COMPLETION_GRACE: Duration = Duration::from_millis(500);

    /// Default overlay redraw rate
    pub const OVERLAY_FPS: u32 = 60;

    /// Default per-request timeout for analysis calls
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 30;

    /// Camera warm-up before the headless scan grabs a frame
    pub const WARMUP: Duration = Duration::from_millis(500);

    /// Give up waiting for a first frame after this long
    pub const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
