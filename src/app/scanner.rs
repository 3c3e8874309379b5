// SPDX-License-Identifier: GPL-3.0-only

//! The scanner facade
//!
//! Owns the media session, the session state channel and the overlay
//! render loop, and runs capture attempts through the analyze pipeline.
//! All methods take `&self`; front-ends usually share it in an `Arc`.

use super::{ScanListener, ScanProgress, SessionState, UserIdentity};
use crate::backends::camera::{CameraBackend, CameraDevice, CameraFormat, CameraFrame, StreamConstraints};
use crate::config::Config;
use crate::errors::{AnalysisError, AppError, CameraError, CaptureError};
use crate::history::{HistoryRecord, HistoryService, HttpHistoryService};
use crate::notifications::{LogNotifier, Notification, Notifier};
use crate::overlay::{OverlayFrame, OverlaySender, RenderLoop, Viewport};
use crate::pipelines::analyze::{AnalysisResult, AnalyzePipeline, EncodedScan, ScanObserver, ScanOutcome};
use crate::session::MediaSession;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of a capture attempt that was allowed to start
pub type CaptureResult = Result<ScanOutcome, CaptureError>;

/// Builder for [`Scanner`]
pub struct ScannerBuilder {
    config: Config,
    backend: Box<dyn CameraBackend>,
    pipeline: Option<AnalyzePipeline>,
    listener: Option<Arc<dyn ScanListener>>,
    notifier: Option<Arc<dyn Notifier>>,
    history: Option<Arc<dyn HistoryService>>,
    user: Option<UserIdentity>,
}

impl ScannerBuilder {
    /// Receives results, payloads and progress
    pub fn listener(mut self, listener: Arc<dyn ScanListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Where user-facing messages go (defaults to the log)
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the HTTP history service
    pub fn history(mut self, history: Arc<dyn HistoryService>) -> Self {
        self.history = Some(history);
        self
    }

    /// Signed-in user whose results are saved to history
    pub fn user(mut self, user: UserIdentity) -> Self {
        self.user = Some(user);
        self
    }

    /// Replace the HTTP endpoints
    pub fn pipeline(mut self, pipeline: AnalyzePipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn build(self) -> Result<Scanner, AppError> {
        let pipeline = match self.pipeline {
            Some(pipeline) => pipeline,
            None => AnalyzePipeline::from_config(&self.config)?,
        };
        let history: Arc<dyn HistoryService> = match self.history {
            Some(history) => history,
            None => Arc::new(HttpHistoryService::new(
                &self.config.history_url,
                self.config.request_timeout(),
            )?),
        };

        let constraints = StreamConstraints {
            facing: self.config.facing,
            preferred_width: self.config.preferred_width,
            preferred_height: self.config.preferred_height,
        };

        let (state, _) = watch::channel(SessionState::Idle);
        let (viewport, _) = watch::channel(Viewport::new(
            self.config.preferred_width,
            self.config.preferred_height,
        ));
        let (overlay, _) = watch::channel(None);

        info!(
            primary = %self.config.primary_url,
            fallback = %self.config.fallback_url,
            signed_in = self.user.is_some(),
            "Scanner created"
        );

        Ok(Scanner {
            inner: Arc::new(Inner {
                session: Mutex::new(MediaSession::new(self.backend, constraints)),
                state,
                viewport,
                overlay: Arc::new(overlay),
                render_loop: Mutex::new(None),
                pipeline,
                listener: self.listener,
                notifier: self.notifier.unwrap_or_else(|| Arc::new(LogNotifier)),
                history,
                user: self.user,
                active_scan: AtomicU64::new(0),
                next_scan: AtomicU64::new(1),
                config: self.config,
            }),
        })
    }
}

/// Camera skin scanner
pub struct Scanner {
    inner: Arc<Inner>,
}

/// State shared with in-flight capture tasks
struct Inner {
    config: Config,
    session: Mutex<MediaSession>,
    state: watch::Sender<SessionState>,
    viewport: watch::Sender<Viewport>,
    overlay: OverlaySender,
    render_loop: Mutex<Option<RenderLoop>>,
    pipeline: AnalyzePipeline,
    listener: Option<Arc<dyn ScanListener>>,
    notifier: Arc<dyn Notifier>,
    history: Arc<dyn HistoryService>,
    user: Option<UserIdentity>,
    /// Id of the capture that owns the Analyzing state, 0 when none
    active_scan: AtomicU64,
    next_scan: AtomicU64,
}

impl Scanner {
    pub fn builder(config: Config, backend: Box<dyn CameraBackend>) -> ScannerBuilder {
        ScannerBuilder {
            config,
            backend,
            pipeline: None,
            listener: None,
            notifier: None,
            history: None,
            user: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Latest overlay redraw, `None` while the camera is off
    pub fn subscribe_overlay(&self) -> watch::Receiver<Option<Arc<OverlayFrame>>> {
        self.inner.overlay.subscribe()
    }

    /// Most recent camera frame while streaming
    pub fn preview_frame(&self) -> Option<Arc<CameraFrame>> {
        self.inner.preview_frame()
    }

    pub fn current_device(&self) -> Option<CameraDevice> {
        self.inner.session().current_device().cloned()
    }

    pub fn list_cameras(&self) -> Vec<CameraDevice> {
        self.inner.session().list_cameras()
    }

    /// Wait up to `timeout` for the first frame of the running stream
    pub async fn wait_for_preview(&self, timeout: Duration) -> Option<Arc<CameraFrame>> {
        let mut preview = self.inner.session().preview()?;
        preview.wait_for_frame(timeout).await
    }

    /// Resize the overlay to the preview area
    pub fn set_viewport(&self, width: u32, height: u32) {
        let size = Viewport::new(width, height);
        self.inner.viewport.send_if_modified(|current| {
            if *current == size {
                return false;
            }
            *current = size;
            true
        });
    }

    /// Open the camera and attach it to the preview
    ///
    /// On failure the user is notified and the scanner stays idle.
    pub fn start_camera(&self) -> Result<CameraFormat, CameraError> {
        let mut session = self.inner.session();
        if let Some(format) = session.format() {
            return Ok(format.clone());
        }

        let format = match session.start() {
            Ok(format) => format,
            Err(e) => {
                error!(error = %e, "Failed to start camera");
                self.inner.notifier.notify(Notification::camera_unavailable(&e));
                return Err(e);
            }
        };
        drop(session);

        self.inner.state.send_if_modified(|state| {
            if *state != SessionState::Idle {
                return false;
            }
            *state = SessionState::Active;
            true
        });
        self.start_render_loop();

        info!(format = %format, "Camera started");
        self.inner.notifier.notify(Notification::camera_started());
        Ok(format)
    }

    /// Release the camera and return to idle
    ///
    /// A capture in flight keeps running; its result still reaches the
    /// listener but no longer changes the state.
    pub fn stop_camera(&self) {
        let released = self.inner.session().stop();

        self.inner.state.send_if_modified(|state| {
            self.inner.active_scan.store(0, Ordering::SeqCst);
            if *state == SessionState::Idle {
                return false;
            }
            *state = SessionState::Idle;
            true
        });

        if let Some(mut render_loop) = self.inner.render_loop().take() {
            render_loop.stop();
        }
        self.inner.overlay.send_replace(None);

        if released {
            info!("Camera stopped");
        }
    }

    /// Detect a stream that ended on its own
    ///
    /// A lost camera is reported once and the scanner returns to idle.
    pub fn check_camera(&self) -> Result<(), CameraError> {
        let checked = self.inner.session().check();
        if let Err(e) = &checked {
            error!(error = %e, "Camera stream lost");
            self.stop_camera();
            self.inner.notifier.notify(Notification::camera_lost(e));
        }
        checked
    }

    /// Stop everything; also run on drop
    pub fn shutdown(&self) {
        debug!("Scanner shutting down");
        self.stop_camera();
    }

    /// Start a capture attempt in the background
    ///
    /// Returns `None` without side effects when the camera is not streaming,
    /// no frame has arrived yet or another capture is in flight. Also
    /// refuses outside a tokio runtime.
    pub fn begin_capture(&self) -> Option<JoinHandle<CaptureResult>> {
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No tokio runtime, capture refused");
            return None;
        }
        self.check_camera().ok()?;
        let frame = self.inner.preview_frame()?;

        let scan_id = self.inner.next_scan.fetch_add(1, Ordering::SeqCst);
        let entered = self.inner.state.send_if_modified(|state| {
            if !state.can_capture() {
                return false;
            }
            self.inner.active_scan.store(scan_id, Ordering::SeqCst);
            *state = SessionState::Analyzing(ScanProgress::capturing());
            true
        });
        if !entered {
            debug!(state = ?self.state(), "Capture refused");
            return None;
        }

        info!(scan = scan_id, width = frame.width, height = frame.height, "Capture started");
        if let Some(listener) = &self.inner.listener {
            listener.on_progress(&ScanProgress::capturing());
        }

        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move { inner.run_scan(scan_id, frame).await }))
    }

    /// Capture the current frame and analyze it
    ///
    /// Returns `None` when no capture could start (see [`Self::begin_capture`]).
    /// The attempt finishes even if this future is dropped.
    pub async fn capture_and_analyze(&self) -> Option<CaptureResult> {
        let handle = self.begin_capture()?;
        match handle.await {
            Ok(result) => Some(result),
            Err(e) => {
                error!(error = %e, "Capture task failed");
                None
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    fn session(&self) -> std::sync::MutexGuard<'_, MediaSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn render_loop(&self) -> std::sync::MutexGuard<'_, Option<RenderLoop>> {
        self.render_loop.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn preview_frame(&self) -> Option<Arc<CameraFrame>> {
        self.session().preview()?.current_frame()
    }

    fn is_current(&self, scan_id: u64) -> bool {
        self.active_scan.load(Ordering::SeqCst) == scan_id
    }

    /// Leave Analyzing for `next`, if this scan still owns the state
    fn finish(&self, scan_id: u64, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if !self.is_current(scan_id) || !state.is_analyzing() {
                return false;
            }
            self.active_scan.store(0, Ordering::SeqCst);
            *state = next;
            true
        })
    }

    async fn run_scan(self: Arc<Self>, scan_id: u64, frame: Arc<CameraFrame>) -> CaptureResult {
        let observer = ScanTracker {
            inner: &self,
            scan_id,
        };

        let outcome = match self.pipeline.run(&frame, &observer).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(scan = scan_id, error = %e, "Capture failed");
                self.notifier
                    .notify(Notification::error("Capture failed", e.to_string()));
                self.finish(scan_id, SessionState::Active);
                return Err(e);
            }
        };

        match &outcome {
            ScanOutcome::Primary { result, scan } => {
                tokio::time::sleep(self.config.completion_grace()).await;
                self.deliver(result);
                self.finish(scan_id, SessionState::Complete);
                self.notifier.notify(Notification::analysis_complete());
                self.persist(result, scan);
            }
            ScanOutcome::Fallback { result, .. } => {
                self.deliver(result);
                self.finish(scan_id, SessionState::Complete);
                self.notifier.notify(Notification::fallback_complete());
            }
            ScanOutcome::Failed { .. } => {
                // The primary failure was already shown
                self.finish(scan_id, SessionState::Active);
            }
        }

        info!(
            scan = scan_id,
            fallback = outcome.is_fallback(),
            succeeded = outcome.result().is_some(),
            "Capture finished"
        );
        Ok(outcome)
    }

    fn deliver(&self, result: &AnalysisResult) {
        if let Some(listener) = &self.listener {
            listener.on_analysis_complete(result.clone());
        }
    }

    /// Save to history in the background when a user is signed in
    fn persist(&self, result: &AnalysisResult, scan: &EncodedScan) {
        let Some(user) = self.user.clone() else {
            return;
        };

        let record = HistoryRecord::from_result(result, &scan.data_uri);
        let history = Arc::clone(&self.history);
        tokio::spawn(async move {
            if let Err(e) = history.save(&user, record).await {
                warn!(user = %user.id, error = %e, "Failed to save scan history");
            }
        });
    }
}

impl Scanner {
    fn start_render_loop(&self) {
        let mut render_loop = self.inner.render_loop();
        if render_loop.as_ref().is_some_and(RenderLoop::is_running) {
            return;
        }
        if tokio::runtime::Handle::try_current().is_err() {
            warn!("No tokio runtime, overlay disabled");
            return;
        }
        if let Some(mut finished) = render_loop.take() {
            finished.stop();
        }

        *render_loop = Some(RenderLoop::spawn(
            self.inner.state.subscribe(),
            self.inner.viewport.subscribe(),
            Arc::clone(&self.inner.overlay),
            self.inner.config.overlay_interval(),
        ));
    }
}

/// Routes pipeline checkpoints into the state channel and the listener
struct ScanTracker<'a> {
    inner: &'a Inner,
    scan_id: u64,
}

impl ScanObserver for ScanTracker<'_> {
    fn progress(&self, progress: ScanProgress) {
        let inner = self.inner;
        let scan_id = self.scan_id;
        inner.state.send_if_modified(|state| {
            if !inner.is_current(scan_id) {
                return false;
            }
            match state {
                SessionState::Analyzing(current) if current.percent <= progress.percent => {
                    *current = progress.clone();
                    true
                }
                _ => false,
            }
        });

        if let Some(listener) = &inner.listener {
            listener.on_progress(&progress);
        }
    }

    fn image_captured(&self, scan: &EncodedScan) {
        debug!(scan = self.scan_id, bytes = scan.jpeg_size, "Scan payload ready");
        if let Some(listener) = &self.inner.listener {
            listener.on_scan_image_captured(scan);
        }
    }

    fn primary_failed(&self, error: &AnalysisError) {
        self.inner
            .notifier
            .notify(Notification::analysis_failed(error));
    }
}
