// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::FacingMode;
use crate::errors::CameraError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraBackendType {
    /// Video4Linux2 capture devices
    #[default]
    V4l2,
    /// Still image streamed as a virtual camera
    StillImage,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "V4L2"),
            CameraBackendType::StillImage => write!(f, "still image"),
        }
    }
}

/// Device information from V4L2 capability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Name of the device (V4L2 card)
    pub card: String,
    /// Driver name (V4L2 driver)
    pub driver: String,
    /// Device path (e.g., /dev/video0)
    pub path: String,
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    pub path: String,                    // Device node or image path
    pub device_info: Option<DeviceInfo>, // V4L2 card/driver when known
    pub camera_location: Option<String>, // "front", "back" or "external" when known
}

impl CameraDevice {
    /// Whether the device is known to face the requested direction
    pub fn faces(&self, facing: FacingMode) -> bool {
        self.camera_location
            .as_deref()
            .is_some_and(|loc| loc.eq_ignore_ascii_case(facing.as_location()))
    }
}

/// Pick the device matching the requested facing, else the first one
pub fn select_device(devices: &[CameraDevice], facing: FacingMode) -> Option<&CameraDevice> {
    devices
        .iter()
        .find(|d| d.faces(facing))
        .or_else(|| devices.first())
}

/// Framerate as a fraction (numerator/denominator)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.num as f64 / self.denom as f64)
        } else {
            write!(f, "{}", self.num)
        }
    }
}

/// Negotiated stream format
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Option<Framerate>,
    pub pixel_format: String, // FourCC code (e.g., "MJPG", "YUYV")
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(f, "{}x{} {} @ {}fps", self.width, self.height, self.pixel_format, fps)
        } else {
            write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
        }
    }
}

/// What the session asks a backend for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub preferred_width: u32,
    pub preferred_height: u32,
}

/// Bytes per RGBA pixel
const RGBA_BYTES: u32 = 4;

/// A single RGBA frame from the camera
///
/// Backends decode to RGBA before publishing.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    /// Bytes per row, may include padding
    pub stride: u32,
    /// When the frame left the device
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Wrap tightly packed RGBA pixels
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data: Arc::from(data.into_boxed_slice()),
            stride: width * RGBA_BYTES,
            captured_at: Instant::now(),
        }
    }

    /// Whether the buffer is large enough for the declared geometry
    pub fn is_well_formed(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            return false;
        }
        let row = self.width * RGBA_BYTES;
        self.stride >= row
            && self.data.len() >= (self.stride as usize) * (self.height as usize - 1) + row as usize
    }

    /// Sample one pixel as RGB, clamping coordinates to the frame
    pub fn pixel_rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let idx = (y * self.stride + x * RGBA_BYTES) as usize;

        match self.data.get(idx..idx + 3) {
            Some(px) => (px[0], px[1], px[2]),
            None => (0, 0, 0),
        }
    }

    /// Copy into tightly packed RGBA rows (stride padding removed)
    pub fn to_rgba_vec(&self) -> Vec<u8> {
        let w = self.width as usize;
        let h = self.height as usize;
        let stride = self.stride as usize;
        let mut out = Vec::with_capacity(w * h * 4);

        for row in 0..h {
            let start = row * stride;
            out.extend_from_slice(&self.data[start..start + w * 4]);
        }

        out
    }
}

/// Latest-frame channel written by a backend's capture thread
pub type FrameSender = watch::Sender<Option<Arc<CameraFrame>>>;

/// Latest-frame channel read by the preview surface
pub type FrameReceiver = watch::Receiver<Option<Arc<CameraFrame>>>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, CameraError>;
