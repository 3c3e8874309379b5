// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the scanner state machine
//!
//! Uses an in-memory camera and scripted endpoints so every path of a
//! capture attempt can be driven deterministically.

use async_trait::async_trait;
use serde_json::{Value, json};
use skin_scanner::app::{AnalysisResult, ScanListener, ScanProgress, Scanner, SessionState, UserIdentity};
use skin_scanner::backends::camera::{
    BackendResult, CameraBackend, CameraBackendType, CameraDevice, CameraFormat, CameraFrame,
    FrameSender, StreamConstraints,
};
use skin_scanner::errors::{AnalysisError, CameraError, PersistenceError};
use skin_scanner::history::{HistoryRecord, HistoryService};
use skin_scanner::notifications::{ChannelNotifier, Notification, NotificationKind};
use skin_scanner::overlay::OverlayMode;
use skin_scanner::pipelines::analyze::{
    AnalysisEndpoint, AnalysisRequest, AnalyzePipeline, EncodedScan, ScanEncoder, ScanOutcome,
};
use skin_scanner::Config;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Camera that streams one solid frame and reports whether it is open
struct FakeCamera {
    device: CameraDevice,
    frame: Arc<CameraFrame>,
    sender: Option<FrameSender>,
    streaming: Arc<AtomicBool>,
    /// Simulates the device going away mid-stream
    lost: Arc<AtomicBool>,
    deny: bool,
}

impl FakeCamera {
    fn new() -> (Self, Arc<AtomicBool>) {
        let streaming = Arc::new(AtomicBool::new(false));
        let camera = Self {
            device: CameraDevice {
                name: "Fake camera".to_string(),
                path: "/dev/fake0".to_string(),
                device_info: None,
                camera_location: Some("front".to_string()),
            },
            frame: Arc::new(CameraFrame::from_rgba(64, 48, vec![180; 64 * 48 * 4])),
            sender: None,
            streaming: streaming.clone(),
            lost: Arc::new(AtomicBool::new(false)),
            deny: false,
        };
        (camera, streaming)
    }

    fn denied() -> Self {
        let (mut camera, _) = Self::new();
        camera.deny = true;
        camera
    }
}

impl CameraBackend for FakeCamera {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        vec![self.device.clone()]
    }

    fn start_stream(
        &mut self,
        _constraints: &StreamConstraints,
        frames: FrameSender,
    ) -> BackendResult<CameraFormat> {
        if self.deny {
            return Err(CameraError::PermissionDenied("not allowed".to_string()));
        }
        frames.send_replace(Some(self.frame.clone()));
        self.sender = Some(frames);
        self.streaming.store(true, Ordering::SeqCst);
        Ok(CameraFormat {
            width: self.frame.width,
            height: self.frame.height,
            framerate: None,
            pixel_format: "RGBA".to_string(),
        })
    }

    fn stop_stream(&mut self) {
        if let Some(sender) = self.sender.take() {
            sender.send_replace(None);
        }
        self.streaming.store(false, Ordering::SeqCst);
        self.lost.store(false, Ordering::SeqCst);
    }

    fn stream_error(&self) -> Option<CameraError> {
        let sender = self.sender.as_ref()?;
        if !self.lost.load(Ordering::SeqCst) {
            return None;
        }
        sender.send_replace(None);
        Some(CameraError::Disconnected)
    }

    fn is_streaming(&self) -> bool {
        self.sender.is_some()
    }

    fn current_device(&self) -> Option<&CameraDevice> {
        self.sender.as_ref().map(|_| &self.device)
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::StillImage
    }
}

/// Endpoint with a fixed reply and an optional delay
struct Scripted {
    name: &'static str,
    reply: Result<Value, u16>,
    delay: Duration,
    requests: Mutex<Vec<AnalysisRequest>>,
}

impl Scripted {
    fn ok(name: &'static str, value: Value) -> Arc<Self> {
        Self::with(name, Ok(value), Duration::ZERO)
    }

    fn status(name: &'static str, status: u16) -> Arc<Self> {
        Self::with(name, Err(status), Duration::ZERO)
    }

    fn with(name: &'static str, reply: Result<Value, u16>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            reply,
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<AnalysisRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisEndpoint for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::time::sleep(self.delay).await;
        match &self.reply {
            Ok(value) => Ok(AnalysisResult(value.clone())),
            Err(status) => Err(AnalysisError::Status {
                endpoint: self.name.to_string(),
                status: *status,
            }),
        }
    }
}

#[derive(Default)]
struct Recorder {
    results: Mutex<Vec<AnalysisResult>>,
    images: Mutex<Vec<EncodedScan>>,
    progress: Mutex<Vec<u8>>,
}

impl ScanListener for Recorder {
    fn on_analysis_complete(&self, result: AnalysisResult) {
        self.results.lock().unwrap().push(result);
    }

    fn on_scan_image_captured(&self, scan: &EncodedScan) {
        self.images.lock().unwrap().push(scan.clone());
    }

    fn on_progress(&self, progress: &ScanProgress) {
        self.progress.lock().unwrap().push(progress.percent);
    }
}

/// History service that reports every save on a channel
struct FakeHistory {
    saved: mpsc::UnboundedSender<(UserIdentity, HistoryRecord)>,
    fail: bool,
}

#[async_trait]
impl HistoryService for FakeHistory {
    async fn save(&self, user: &UserIdentity, record: HistoryRecord) -> Result<(), PersistenceError> {
        let _ = self.saved.send((user.clone(), record));
        if self.fail {
            Err(PersistenceError::Status(500))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    scanner: Scanner,
    streaming: Arc<AtomicBool>,
    lost: Arc<AtomicBool>,
    recorder: Arc<Recorder>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    saved: mpsc::UnboundedReceiver<(UserIdentity, HistoryRecord)>,
}

impl Harness {
    fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }

    fn results(&self) -> Vec<AnalysisResult> {
        self.recorder.results.lock().unwrap().clone()
    }
}

fn test_config() -> Config {
    Config {
        completion_grace_ms: 0,
        overlay_fps: 200,
        ..Config::default()
    }
}

fn harness(
    primary: Arc<Scripted>,
    fallback: Arc<Scripted>,
    user: Option<UserIdentity>,
    history_fails: bool,
) -> Harness {
    let (camera, streaming) = FakeCamera::new();
    let lost = camera.lost.clone();
    let (notifier, notifications) = ChannelNotifier::new();
    let (saved_tx, saved) = mpsc::unbounded_channel();
    let recorder = Arc::new(Recorder::default());

    let mut builder = Scanner::builder(test_config(), Box::new(camera))
        .pipeline(AnalyzePipeline::new(
            ScanEncoder::new(Default::default()),
            primary,
            fallback,
        ))
        .listener(recorder.clone())
        .notifier(Arc::new(notifier))
        .history(Arc::new(FakeHistory {
            saved: saved_tx,
            fail: history_fails,
        }));
    if let Some(user) = user {
        builder = builder.user(user);
    }

    Harness {
        scanner: builder.build().unwrap(),
        streaming,
        lost,
        recorder,
        notifications,
        saved,
    }
}

fn errors(notifications: &[Notification]) -> usize {
    notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::Error)
        .count()
}

// ---------------------------------------------------------------------------
// Camera lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_start_camera_activates_session() {
    let mut h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    assert_eq!(h.scanner.state(), SessionState::Idle);

    let format = h.scanner.start_camera().unwrap();
    assert_eq!((format.width, format.height), (64, 48));
    assert_eq!(h.scanner.state(), SessionState::Active);
    assert!(h.streaming.load(Ordering::SeqCst));
    assert!(h.scanner.preview_frame().is_some());

    let notes = h.drain();
    assert_eq!(notes, vec![Notification::camera_started()]);
}

#[tokio::test]
async fn test_denied_camera_stays_idle() {
    let (notifier, mut notifications) = ChannelNotifier::new();
    let scanner = Scanner::builder(test_config(), Box::new(FakeCamera::denied()))
        .pipeline(AnalyzePipeline::new(
            ScanEncoder::new(Default::default()),
            Scripted::ok("primary", json!({})),
            Scripted::ok("fallback", json!({})),
        ))
        .notifier(Arc::new(notifier))
        .build()
        .unwrap();

    let err = scanner.start_camera().unwrap_err();
    assert!(matches!(err, CameraError::PermissionDenied(_)));
    assert_eq!(scanner.state(), SessionState::Idle);

    let note = notifications.try_recv().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert!(note.description.starts_with("Could not access camera"));
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn test_stop_camera_releases_stream() {
    let h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    h.scanner.stop_camera();
    assert!(!h.streaming.load(Ordering::SeqCst));
    assert_eq!(h.scanner.state(), SessionState::Idle);
    assert!(h.scanner.preview_frame().is_none());

    // Stopping again is a no-op
    h.scanner.stop_camera();
    assert_eq!(h.scanner.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_capture_requires_active_camera() {
    let h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    assert!(h.scanner.capture_and_analyze().await.is_none());
    assert_eq!(h.scanner.state(), SessionState::Idle);
    assert!(h.results().is_empty());
}

#[tokio::test]
async fn test_wait_for_preview_follows_stream() {
    let h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    assert!(h.scanner.wait_for_preview(Duration::from_millis(50)).await.is_none());

    h.scanner.start_camera().unwrap();
    let frame = h.scanner.wait_for_preview(Duration::from_millis(50)).await.unwrap();
    assert_eq!((frame.width, frame.height), (64, 48));
}

#[tokio::test]
async fn test_lost_camera_refuses_capture_and_goes_idle() {
    let mut h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();
    h.drain();

    h.lost.store(true, Ordering::SeqCst);
    assert!(h.scanner.begin_capture().is_none());

    assert_eq!(h.scanner.state(), SessionState::Idle);
    assert!(!h.streaming.load(Ordering::SeqCst));
    assert!(h.scanner.preview_frame().is_none());
    assert_eq!(errors(&h.drain()), 1);
    assert!(h.results().is_empty());

    // Reported once
    assert!(h.scanner.check_camera().is_ok());
    assert!(h.drain().is_empty());
}

#[test]
fn test_capture_without_runtime_is_refused() {
    let h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    assert!(h.scanner.begin_capture().is_none());
    assert_eq!(h.scanner.state(), SessionState::Active);
    assert!(h.recorder.progress.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Capture outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_primary_success_delivers_result_once() {
    let primary = Scripted::ok("primary", json!({ "condition": "healthy", "confidence": 0.93 }));
    let fallback = Scripted::ok("fallback", json!({ "mock": true }));
    let mut h = harness(primary.clone(), fallback.clone(), None, false);
    h.scanner.start_camera().unwrap();
    h.drain();

    let outcome = h.scanner.capture_and_analyze().await.unwrap().unwrap();

    assert!(matches!(outcome, ScanOutcome::Primary { .. }));
    assert_eq!(
        h.results(),
        vec![AnalysisResult(json!({ "condition": "healthy", "confidence": 0.93 }))]
    );
    assert_eq!(h.scanner.state(), SessionState::Complete);
    assert!(fallback.requests().is_empty());

    // Progress reaches 100 before completion and never goes backwards
    let progress = h.recorder.progress.lock().unwrap().clone();
    assert_eq!(progress, vec![0, 20, 50, 100]);

    // Payload went out before the request and matches it
    let images = h.recorder.images.lock().unwrap().clone();
    assert_eq!(images.len(), 1);
    assert_eq!(primary.requests()[0].image, images[0].data_uri);
    assert!(images[0].data_uri.starts_with("data:image/jpeg;base64,"));

    assert_eq!(h.drain(), vec![Notification::analysis_complete()]);
}

#[tokio::test]
async fn test_fallback_success_after_primary_500() {
    let primary = Scripted::status("primary", 500);
    let fallback = Scripted::ok("fallback", json!({ "result": "ok" }));
    let mut h = harness(primary.clone(), fallback.clone(), None, false);
    h.scanner.start_camera().unwrap();
    h.drain();

    let outcome = h.scanner.capture_and_analyze().await.unwrap().unwrap();

    assert!(outcome.is_fallback());
    assert_eq!(h.results(), vec![AnalysisResult(json!({ "result": "ok" }))]);
    assert_eq!(h.scanner.state(), SessionState::Complete);

    // Fallback receives the identical payload
    assert_eq!(primary.requests(), fallback.requests());

    let notes = h.drain();
    assert_eq!(errors(&notes), 1);
    assert!(notes.contains(&Notification::fallback_complete()));
    assert!(!notes.contains(&Notification::analysis_complete()));
}

#[tokio::test]
async fn test_both_failing_returns_to_active() {
    let mut h = harness(
        Scripted::status("primary", 502),
        Scripted::status("fallback", 503),
        None,
        false,
    );
    h.scanner.start_camera().unwrap();
    h.drain();

    let outcome = h.scanner.capture_and_analyze().await.unwrap().unwrap();

    assert!(matches!(outcome, ScanOutcome::Failed { .. }));
    assert!(h.results().is_empty());
    assert_eq!(h.scanner.state(), SessionState::Active);

    // Only the primary failure is shown
    let notes = h.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(errors(&notes), 1);

    // Retry is allowed
    assert!(h.scanner.capture_and_analyze().await.is_some());
}

#[tokio::test]
async fn test_rescan_from_complete() {
    let h = harness(Scripted::ok("primary", json!({ "n": 1 })), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    h.scanner.capture_and_analyze().await.unwrap().unwrap();
    assert_eq!(h.scanner.state(), SessionState::Complete);

    h.scanner.capture_and_analyze().await.unwrap().unwrap();
    assert_eq!(h.results().len(), 2);
    assert_eq!(h.scanner.state(), SessionState::Complete);
}

#[tokio::test]
async fn test_capture_is_single_flight() {
    let primary = Scripted::with("primary", Ok(json!({})), Duration::from_millis(200));
    let h = harness(primary.clone(), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    let first = h.scanner.begin_capture().unwrap();
    assert!(h.scanner.state().is_analyzing());
    assert!(h.scanner.begin_capture().is_none());
    assert!(h.scanner.capture_and_analyze().await.is_none());

    first.await.unwrap().unwrap();
    assert_eq!(primary.requests().len(), 1);
    assert_eq!(h.results().len(), 1);
}

// ---------------------------------------------------------------------------
// Teardown during analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stop_mid_scan_releases_stream_and_keeps_result() {
    let primary = Scripted::with("primary", Ok(json!({ "late": true })), Duration::from_millis(150));
    let h = harness(primary, Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    let scan = h.scanner.begin_capture().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    h.scanner.stop_camera();

    assert!(!h.streaming.load(Ordering::SeqCst));
    assert_eq!(h.scanner.state(), SessionState::Idle);

    scan.await.unwrap().unwrap();
    assert_eq!(h.results(), vec![AnalysisResult(json!({ "late": true }))]);
    // A late result does not resurrect the session
    assert_eq!(h.scanner.state(), SessionState::Idle);
}

#[tokio::test]
async fn test_drop_mid_scan_stops_device() {
    let primary = Scripted::with("primary", Ok(json!({})), Duration::from_millis(150));
    let h = harness(primary, Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();

    let scan = h.scanner.begin_capture().unwrap();
    let Harness {
        scanner, streaming, recorder, ..
    } = h;
    drop(scanner);

    assert!(!streaming.load(Ordering::SeqCst));

    // The in-flight request still completes in the background
    scan.await.unwrap().unwrap();
    assert_eq!(recorder.results.lock().unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_signed_in_results_are_saved() {
    let user = UserIdentity::new("user-1").with_access_token("token");
    let mut h = harness(
        Scripted::ok("primary", json!({ "condition": "acne" })),
        Scripted::ok("fallback", json!({})),
        Some(user.clone()),
        false,
    );
    h.scanner.start_camera().unwrap();
    h.scanner.capture_and_analyze().await.unwrap().unwrap();

    let (saved_user, record) = tokio::time::timeout(Duration::from_secs(2), h.saved.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved_user, user);

    let image = h.recorder.images.lock().unwrap()[0].data_uri.clone();
    assert_eq!(
        serde_json::to_value(&record).unwrap(),
        json!({ "condition": "acne", "scanImage": image })
    );
}

#[tokio::test]
async fn test_anonymous_results_are_not_saved() {
    let mut h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    h.scanner.start_camera().unwrap();
    h.scanner.capture_and_analyze().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.saved.try_recv().is_err());
}

#[tokio::test]
async fn test_fallback_results_are_not_saved() {
    let mut h = harness(
        Scripted::status("primary", 503),
        Scripted::ok("fallback", json!({ "mock": true })),
        Some(UserIdentity::new("user-7")),
        false,
    );
    h.scanner.start_camera().unwrap();
    let outcome = h.scanner.capture_and_analyze().await.unwrap().unwrap();
    assert!(outcome.is_fallback());
    assert_eq!(h.results().len(), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.saved.try_recv().is_err());
}

#[tokio::test]
async fn test_history_failure_is_silent() {
    let mut h = harness(
        Scripted::ok("primary", json!({})),
        Scripted::ok("fallback", json!({})),
        Some(UserIdentity::new("user-2")),
        true,
    );
    h.scanner.start_camera().unwrap();
    h.drain();
    h.scanner.capture_and_analyze().await.unwrap().unwrap();

    tokio::time::timeout(Duration::from_secs(2), h.saved.recv())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(h.scanner.state(), SessionState::Complete);
    assert_eq!(errors(&h.drain()), 0);
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_overlay_follows_session() {
    let primary = Scripted::with("primary", Ok(json!({})), Duration::from_millis(300));
    let h = harness(primary, Scripted::ok("fallback", json!({})), None, false);
    let mut overlay = h.scanner.subscribe_overlay();
    h.scanner.set_viewport(200, 120);
    h.scanner.start_camera().unwrap();

    let guide = overlay
        .wait_for(|f| f.as_ref().is_some_and(|f| f.mode == OverlayMode::Guide && f.width == 200))
        .await
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!(guide.height, 120);

    let scan = h.scanner.begin_capture().unwrap();
    overlay
        .wait_for(|f| f.as_ref().is_some_and(|f| matches!(f.mode, OverlayMode::Scanning { .. })))
        .await
        .unwrap();

    h.scanner.stop_camera();
    assert!(overlay.borrow().is_none());
    scan.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlay_cleared_after_rapid_stop() {
    let h = harness(Scripted::ok("primary", json!({})), Scripted::ok("fallback", json!({})), None, false);
    let overlay = h.scanner.subscribe_overlay();
    h.scanner.set_viewport(2560, 1440);

    let mut stale = 0;
    for round in 0..200u64 {
        h.scanner.start_camera().unwrap();
        tokio::time::sleep(Duration::from_micros(300 + (round % 10) * 200)).await;
        h.scanner.stop_camera();

        tokio::time::sleep(Duration::from_millis(10)).await;
        if overlay.borrow().is_some() {
            stale += 1;
        }
    }
    assert_eq!(stale, 0);
    assert_eq!(h.scanner.state(), SessionState::Idle);
}
