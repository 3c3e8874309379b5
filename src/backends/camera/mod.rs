// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │    MediaSession     │  ← start/stop, preview surface
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraBackend Trait│  ← Common interface
//! └──────────┬──────────┘
//!            │
//!      ┌─────┴──────┐
//!      ▼            ▼
//!  ┌───────┐  ┌────────────┐
//!  │ V4L2  │  │ StillImage │
//!  └───────┘  └────────────┘
//! ```
//!
//! Backends publish decoded RGBA frames into a latest-value channel; the
//! session's preview surface reads from the other end.

pub mod format_converters;
pub mod still_image;
pub mod types;
pub mod v4l2;

use crate::errors::CameraError;

pub use still_image::StillImageBackend;
pub use types::*;
pub use v4l2::V4l2Backend;

/// Camera backend trait
///
/// A backend owns at most one active stream. `stop_stream` must release
/// every device handle the stream holds and is a no-op when idle.
pub trait CameraBackend: Send {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a device matching the constraints and start publishing frames
    ///
    /// # Returns
    /// * `Ok(CameraFormat)` - The negotiated format
    /// * `Err(CameraError)` - No device, permission denied, busy, ...
    fn start_stream(
        &mut self,
        constraints: &StreamConstraints,
        frames: FrameSender,
    ) -> BackendResult<CameraFormat>;

    /// Stop the active stream and release the device
    fn stop_stream(&mut self);

    /// Check if a stream is active
    fn is_streaming(&self) -> bool;

    /// Error that ended the stream without `stop_stream`, if any
    ///
    /// Backends clear the frame channel before reporting it.
    fn stream_error(&self) -> Option<CameraError> {
        None
    }

    /// Get the currently streaming device
    fn current_device(&self) -> Option<&CameraDevice>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;
}

/// Get the default hardware backend
pub fn get_backend() -> Box<dyn CameraBackend> {
    Box::new(V4l2Backend::new())
}
