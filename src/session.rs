// SPDX-License-Identifier: GPL-3.0-only

//! Media session controller
//!
//! Owns the camera backend exclusively, starts and stops the stream and
//! exposes the live frames as a preview surface. Dropping the session
//! always releases the device.

use crate::backends::camera::{
    BackendResult, CameraBackend, CameraDevice, CameraFormat, CameraFrame, FrameReceiver,
    StreamConstraints,
};
use crate::errors::CameraError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Read side of an attached stream
#[derive(Clone)]
pub struct PreviewSurface {
    frames: FrameReceiver,
}

impl PreviewSurface {
    /// Most recent frame, if the stream has produced one
    pub fn current_frame(&self) -> Option<Arc<CameraFrame>> {
        self.frames.borrow().clone()
    }

    /// Wait until a frame is available or the timeout passes
    pub async fn wait_for_frame(&mut self, timeout: Duration) -> Option<Arc<CameraFrame>> {
        let wait = self.frames.wait_for(|frame| frame.is_some());
        match tokio::time::timeout(timeout, wait).await {
            Ok(Ok(frame)) => frame.clone(),
            _ => None,
        }
    }
}

/// Camera session: one backend, at most one attached stream
pub struct MediaSession {
    backend: Box<dyn CameraBackend>,
    constraints: StreamConstraints,
    preview: Option<PreviewSurface>,
    format: Option<CameraFormat>,
}

impl MediaSession {
    pub fn new(backend: Box<dyn CameraBackend>, constraints: StreamConstraints) -> Self {
        info!(backend = %backend.backend_type(), "Creating media session");
        Self {
            backend,
            constraints,
            preview: None,
            format: None,
        }
    }

    /// Request a stream matching the constraints and attach it to the preview
    ///
    /// Starting an already active session keeps the current stream.
    pub fn start(&mut self) -> BackendResult<CameraFormat> {
        if let Some(format) = &self.format {
            debug!("Session already active");
            return Ok(format.clone());
        }

        let (sender, receiver) = watch::channel(None);
        let format = self.backend.start_stream(&self.constraints, sender)?;

        info!(format = %format, "Stream attached to preview");
        self.preview = Some(PreviewSurface { frames: receiver });
        self.format = Some(format.clone());
        Ok(format)
    }

    /// Halt all device tracks and detach the preview
    ///
    /// Returns false when there was nothing to stop.
    pub fn stop(&mut self) -> bool {
        let was_active = self.format.is_some() || self.backend.is_streaming();
        if !was_active {
            return false;
        }

        self.backend.stop_stream();
        self.preview = None;
        self.format = None;
        info!("Stream released");
        true
    }

    pub fn is_active(&self) -> bool {
        self.format.is_some()
    }

    /// Fails when an attached stream ended on its own
    pub fn check(&self) -> Result<(), CameraError> {
        if !self.is_active() {
            return Ok(());
        }
        match self.backend.stream_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Handle on the live frames while the stream is attached
    pub fn preview(&self) -> Option<PreviewSurface> {
        self.preview.clone()
    }

    pub fn format(&self) -> Option<&CameraFormat> {
        self.format.as_ref()
    }

    pub fn current_device(&self) -> Option<&CameraDevice> {
        self.backend.current_device()
    }

    pub fn list_cameras(&self) -> Vec<CameraDevice> {
        self.backend.enumerate_cameras()
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        if self.stop() {
            debug!("MediaSession dropped, stream released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::StillImageBackend;
    use crate::constants::FacingMode;

    fn session() -> MediaSession {
        let backend = StillImageBackend::from_frame(
            "still",
            "mem://still",
            CameraFrame::from_rgba(4, 4, vec![50; 64]),
        );
        MediaSession::new(
            Box::new(backend),
            StreamConstraints {
                facing: FacingMode::Front,
                preferred_width: 1280,
                preferred_height: 720,
            },
        )
    }

    #[test]
    fn start_attaches_preview() {
        let mut session = session();
        assert!(session.preview().is_none());

        session.start().unwrap();
        assert!(session.is_active());
        let frame = session.preview().unwrap().current_frame().unwrap();
        assert_eq!(frame.width, 4);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut session = session();
        assert!(!session.stop());

        session.start().unwrap();
        assert!(session.stop());
        assert!(!session.is_active());
        assert!(session.preview().is_none());
        assert!(!session.stop());
    }

    #[test]
    fn restart_after_stop() {
        let mut session = session();
        session.start().unwrap();
        session.stop();
        session.start().unwrap();
        assert!(session.preview().unwrap().current_frame().is_some());
    }

    #[test]
    fn check_passes_for_healthy_stream() {
        let mut session = session();
        assert!(session.check().is_ok());
        session.start().unwrap();
        assert!(session.check().is_ok());
    }

    #[tokio::test]
    async fn wait_for_frame_returns_published_frame() {
        let mut session = session();
        session.start().unwrap();
        let mut preview = session.preview().unwrap();
        let frame = preview.wait_for_frame(Duration::from_millis(100)).await;
        assert!(frame.is_some());
    }
}
