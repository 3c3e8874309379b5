// SPDX-License-Identifier: GPL-3.0-only

//! Direct V4L2 capture backend
//!
//! Opens a `/dev/video*` node with the v4l crate, negotiates MJPG or YUYV
//! near the preferred resolution and runs a capture thread that decodes
//! every buffer to RGBA for the preview surface.

use super::format_converters::{SUPPORTED_FOURCCS, mjpeg_to_rgba, yuyv_to_rgba};
use super::types::*;
use super::CameraBackend;
use crate::constants::timing::FRAME_LOG_INTERVAL;
use crate::errors::CameraError;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Number of mmap buffers queued on the device
const STREAM_BUFFERS: u32 = 4;

/// An active capture thread
struct ActiveStream {
    device: CameraDevice,
    running: Arc<AtomicBool>,
    /// Set by the capture thread when the device goes away
    failure: Arc<Mutex<Option<CameraError>>>,
    thread_handle: Option<JoinHandle<()>>,
}

/// V4L2 camera backend
#[derive(Default)]
pub struct V4l2Backend {
    active: Option<ActiveStream>,
    /// Device node to open instead of selecting by facing
    device_path: Option<String>,
}

impl V4l2Backend {
    pub fn new() -> Self {
        Self {
            active: None,
            device_path: None,
        }
    }

    /// Always open `path`, ignoring the facing constraint
    pub fn with_device_path(path: impl Into<String>) -> Self {
        Self {
            active: None,
            device_path: Some(path.into()),
        }
    }
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut cameras = Vec::new();

        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            let Ok(dev) = Device::with_path(&path) else {
                debug!(path = %path, "Skipping unopenable video node");
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            // Metadata-only nodes share the card name but cannot stream video
            if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
                continue;
            }

            cameras.push(CameraDevice {
                name: node.name().unwrap_or_else(|| caps.card.clone()),
                path: path.clone(),
                device_info: Some(DeviceInfo {
                    card: caps.card,
                    driver: caps.driver,
                    path,
                }),
                camera_location: None,
            });
        }

        cameras.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = cameras.len(), "Enumerated V4L2 cameras");
        cameras
    }

    fn start_stream(
        &mut self,
        constraints: &StreamConstraints,
        frames: FrameSender,
    ) -> BackendResult<CameraFormat> {
        if self.active.is_some() {
            return Err(CameraError::Busy);
        }

        let cameras = self.enumerate_cameras();
        let device = match &self.device_path {
            Some(path) => cameras.iter().find(|c| &c.path == path),
            None => select_device(&cameras, constraints.facing),
        }
        .cloned()
        .ok_or(CameraError::NoCameraFound)?;

        info!(device = %device.name, path = %device.path, "Opening V4L2 device");

        let running = Arc::new(AtomicBool::new(true));
        let failure = Arc::new(Mutex::new(None));
        let control = StreamControl {
            running: Arc::clone(&running),
            failure: Arc::clone(&failure),
        };
        let path = device.path.clone();
        let constraints = *constraints;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let thread_handle = std::thread::Builder::new()
            .name("v4l2-capture".to_string())
            .spawn(move || capture_thread(&path, constraints, frames, control, ready_tx))
            .map_err(|e| CameraError::InitializationFailed(e.to_string()))?;

        // The thread reports the negotiated format (or the open error) before streaming
        let negotiated = ready_rx.recv().unwrap_or_else(|_| {
            Err(CameraError::InitializationFailed(
                "Capture thread exited during setup".to_string(),
            ))
        });

        match negotiated {
            Ok(format) => {
                info!(format = %format, "V4L2 stream started");
                self.active = Some(ActiveStream {
                    device,
                    running,
                    failure,
                    thread_handle: Some(thread_handle),
                });
                Ok(format)
            }
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                if thread_handle.join().is_err() {
                    warn!("V4L2 capture thread panicked during setup");
                }
                Err(e)
            }
        }
    }

    fn stop_stream(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };

        info!(device = %active.device.name, "Stopping V4L2 stream");
        active.running.store(false, Ordering::SeqCst);
        if let Some(handle) = active.thread_handle.take()
            && handle.join().is_err()
        {
            warn!("V4L2 capture thread panicked");
        }
    }

    fn is_streaming(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.running.load(Ordering::SeqCst))
    }

    fn stream_error(&self) -> Option<CameraError> {
        let active = self.active.as_ref()?;
        active.failure.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.active.as_ref().map(|a| &a.device)
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }
}

impl Drop for V4l2Backend {
    fn drop(&mut self) {
        self.stop_stream();
    }
}

/// Open the device and negotiate the first supported FourCC
fn open_device(path: &str, constraints: &StreamConstraints) -> BackendResult<(Device, Format)> {
    let dev = Device::with_path(path).map_err(CameraError::from)?;

    let mut chosen = None;
    for fourcc in SUPPORTED_FOURCCS {
        let wanted = Format::new(
            constraints.preferred_width,
            constraints.preferred_height,
            FourCC::new(fourcc),
        );
        match dev.set_format(&wanted) {
            Ok(applied) if applied.fourcc == FourCC::new(fourcc) => {
                chosen = Some(applied);
                break;
            }
            Ok(applied) => {
                debug!(wanted = %FourCC::new(fourcc), got = %applied.fourcc, "Format not accepted");
            }
            Err(e) => {
                debug!(fourcc = %FourCC::new(fourcc), error = %e, "set_format failed");
            }
        }
    }

    let format = chosen.ok_or_else(|| {
        CameraError::InitializationFailed("Device offers neither MJPG nor YUYV".to_string())
    })?;

    Ok((dev, format))
}

/// Shared between the backend and its capture thread
struct StreamControl {
    running: Arc<AtomicBool>,
    failure: Arc<Mutex<Option<CameraError>>>,
}

impl StreamControl {
    /// Record a lost device and withdraw the last frame
    fn fail(&self, frames: &FrameSender, error: CameraError) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(error);
        self.running.store(false, Ordering::SeqCst);
        frames.send_replace(None);
    }
}

/// Capture loop running in its own thread
fn capture_thread(
    path: &str,
    constraints: StreamConstraints,
    frames: FrameSender,
    control: StreamControl,
    ready: mpsc::SyncSender<BackendResult<CameraFormat>>,
) {
    let (dev, format) = match open_device(path, &constraints) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let framerate = dev
        .params()
        .ok()
        .map(|p| Framerate::new(p.interval.denominator, p.interval.numerator));

    let mut stream = match MmapStream::with_buffers(&dev, Type::VideoCapture, STREAM_BUFFERS) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(CameraError::from(e)));
            return;
        }
    };

    let is_mjpeg = format.fourcc == FourCC::new(b"MJPG");
    let _ = ready.send(Ok(CameraFormat {
        width: format.width,
        height: format.height,
        framerate,
        pixel_format: format.fourcc.to_string(),
    }));

    let mut frame_count: u64 = 0;

    while control.running.load(Ordering::SeqCst) {
        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) => {
                error!(error = %e, "V4L2 dequeue failed, stopping capture");
                control.fail(&frames, CameraError::Disconnected);
                break;
            }
        };

        let captured_at = Instant::now();
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let payload = &buf[..used];

        let frame = if is_mjpeg {
            match mjpeg_to_rgba(payload) {
                Some((rgba, width, height)) => CameraFrame::from_rgba(width, height, rgba),
                None => continue,
            }
        } else {
            CameraFrame::from_rgba(
                format.width,
                format.height,
                yuyv_to_rgba(payload, format.width, format.height),
            )
        };

        frames.send_replace(Some(Arc::new(CameraFrame {
            captured_at,
            ..frame
        })));

        frame_count += 1;
        if frame_count % FRAME_LOG_INTERVAL == 0 {
            debug!(frame = frame_count, bytes = used, "V4L2 frame published");
        }
    }

    info!(frames = frame_count, "V4L2 capture thread exiting");
}
