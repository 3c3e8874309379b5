// SPDX-License-Identifier: GPL-3.0-only

//! Still image virtual camera
//!
//! Streams one image file (or an in-memory frame) as if it were a camera.
//! Used for headless scans of existing photos and for exercising the
//! session without hardware.

use super::CameraBackend;
use super::types::*;
use crate::errors::CameraError;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Virtual camera serving a fixed frame
pub struct StillImageBackend {
    device: CameraDevice,
    frame: Arc<CameraFrame>,
    frames: Option<FrameSender>,
}

impl StillImageBackend {
    /// Load an image file as the frame source
    pub fn from_path(path: &Path) -> BackendResult<Self> {
        info!(path = %path.display(), "Loading image file");

        let img = image::open(path).map_err(|e| {
            CameraError::InitializationFailed(format!(
                "Failed to load image '{}': {}",
                path.display(),
                e
            ))
        })?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        info!(width, height, "Image loaded successfully");

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        Ok(Self::from_frame(
            name,
            &path.to_string_lossy(),
            CameraFrame::from_rgba(width, height, rgba.into_raw()),
        ))
    }

    /// Serve an in-memory frame
    pub fn from_frame(name: impl Into<String>, path: &str, frame: CameraFrame) -> Self {
        Self {
            device: CameraDevice {
                name: name.into(),
                path: path.to_string(),
                device_info: None,
                camera_location: Some("external".to_string()),
            },
            frame: Arc::new(frame),
            frames: None,
        }
    }
}

impl CameraBackend for StillImageBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        vec![self.device.clone()]
    }

    fn start_stream(
        &mut self,
        _constraints: &StreamConstraints,
        frames: FrameSender,
    ) -> BackendResult<CameraFormat> {
        if self.frames.is_some() {
            return Err(CameraError::Busy);
        }

        frames.send_replace(Some(Arc::clone(&self.frame)));
        self.frames = Some(frames);

        Ok(CameraFormat {
            width: self.frame.width,
            height: self.frame.height,
            framerate: None,
            pixel_format: "RGBA".to_string(),
        })
    }

    fn stop_stream(&mut self) {
        if let Some(frames) = self.frames.take() {
            frames.send_replace(None);
        }
    }

    fn is_streaming(&self) -> bool {
        self.frames.is_some()
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.frames.as_ref().map(|_| &self.device)
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }
}
