// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based skin scanner
//!
//! Renders the camera feed with the scanning overlay using Unicode
//! half-block characters for improved vertical resolution.

use crate::app::{AnalysisResult, ScanListener, Scanner, SessionState};
use crate::backends::camera::{CameraBackend, CameraFrame};
use crate::config::Config;
use crate::notifications::{ChannelNotifier, Notification, NotificationKind};
use crate::overlay::OverlayFrame;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    style::Style, widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// How long a notification stays in the status bar
const NOTIFICATION_TTL: Duration = Duration::from_secs(4);

/// Run the terminal scanner
pub fn run(config: Config, backend: Box<dyn CameraBackend>) -> Result<(), Box<dyn std::error::Error>> {
    // Background workers drive the overlay and the network calls
    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    let (notifier, notifications) = ChannelNotifier::new();
    let results = Arc::new(LatestResult::default());
    let mirror = config.mirror_preview;

    let scanner = Scanner::builder(config, backend)
        .notifier(Arc::new(notifier))
        .listener(results.clone())
        .build()?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &scanner, notifications, &results, mirror);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    scanner.shutdown();
    result
}

/// Keeps the most recent analysis result for display
#[derive(Default)]
struct LatestResult {
    summary: Mutex<Option<String>>,
}

impl LatestResult {
    fn get(&self) -> Option<String> {
        self.summary.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ScanListener for LatestResult {
    fn on_analysis_complete(&self, result: AnalysisResult) {
        let summary = result.as_json().to_string();
        info!(bytes = summary.len(), "Result received");
        *self.summary.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    scanner: &Scanner,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    results: &LatestResult,
    mirror: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let overlay = scanner.subscribe_overlay();
    let mut toast: Option<(Notification, Instant)> = None;

    // Camera starts with the app; failures show up as a notification
    let _ = scanner.start_camera();

    loop {
        // A lost camera queues its own notification below
        let _ = scanner.check_camera();

        while let Ok(notification) = notifications.try_recv() {
            debug!(title = %notification.title, "Notification");
            toast = Some((notification, Instant::now()));
        }
        if toast
            .as_ref()
            .is_some_and(|(_, shown)| shown.elapsed() > NOTIFICATION_TTL)
        {
            toast = None;
        }

        let state = scanner.state();
        let frame = scanner.preview_frame();
        let overlay_frame = overlay.borrow().clone();
        let result_line = results.get();

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve two bottom lines for result and status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(2),
            };

            let widget = FrameWidget {
                frame: frame.as_deref(),
                overlay: overlay_frame.as_deref(),
                mirror,
                camera_on: state.is_camera_active(),
            };
            if let Some((w, h)) = widget.display_size(camera_area) {
                scanner.set_viewport(w as u32, h as u32 * 2);
            }
            f.render_widget(widget, camera_area);

            let result_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(2),
                width: area.width,
                height: 1,
            };
            let result_text = match &result_line {
                Some(summary) => format!("Result: {}", summary),
                None => String::new(),
            };
            f.render_widget(
                StatusBar {
                    message: &result_text,
                    color: Color::Black,
                },
                result_area,
            );

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            let (message, color) = match &toast {
                Some((n, _)) => (
                    n.to_string(),
                    match n.kind {
                        NotificationKind::Success => Color::Green,
                        NotificationKind::Error => Color::Red,
                    },
                ),
                None => (build_status_message(&state), Color::DarkGray),
            };
            f.render_widget(
                StatusBar {
                    message: &message,
                    color,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(Duration::from_millis(16))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            match key.code {
                KeyCode::Char('q') => break,
                KeyCode::Char('s') => {
                    if state.is_camera_active() {
                        scanner.stop_camera();
                    } else {
                        let _ = scanner.start_camera();
                    }
                }
                KeyCode::Char('c') | KeyCode::Char(' ') => {
                    if scanner.begin_capture().is_none() {
                        debug!(state = state.label(), "Capture not available");
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn build_status_message(state: &SessionState) -> String {
    match state {
        SessionState::Idle => "Camera off | 's' start camera | 'q' quit".to_string(),
        SessionState::Active => "Ready | 'c' scan | 's' stop camera | 'q' quit".to_string(),
        SessionState::Analyzing(progress) => {
            format!("{} | 's' stop camera | 'q' quit", progress)
        }
        SessionState::Complete => "Complete | 'c' scan again | 's' stop camera | 'q' quit".to_string(),
    }
}

/// Widget that renders a camera frame and the overlay using half-blocks
struct FrameWidget<'a> {
    frame: Option<&'a CameraFrame>,
    overlay: Option<&'a OverlayFrame>,
    mirror: bool,
    camera_on: bool,
}

impl FrameWidget<'_> {
    /// Cells covered by the frame when fitted into `area`
    fn display_size(&self, area: Rect) -> Option<(u16, u16)> {
        let frame = self.frame?;
        if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
            return None;
        }

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (w, h) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            (term_height * frame_aspect, term_height)
        } else {
            // Terminal is taller - fit to width
            (term_width, term_width / frame_aspect)
        };

        Some(((w as u16).max(1), ((h / 2.0) as u16).max(1)))
    }
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (Some(frame), Some((display_width, display_height))) =
            (self.frame, self.display_size(area))
        else {
            let msg = if self.camera_on {
                "Waiting for camera..."
            } else {
                "Camera is off. Press 's' to start."
            };
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        // Scale factors
        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let mut src_x = (tx as f64 * x_scale) as u32;
                if self.mirror {
                    src_x = frame.width.saturating_sub(1).saturating_sub(src_x);
                }
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let mut top = frame.pixel_rgb(src_x, src_y_top);
                let mut bottom = frame.pixel_rgb(src_x, src_y_bottom);

                // Overlay pixels are laid out over the displayed area
                if let Some(overlay) = self.overlay {
                    let (ox, oy_top, oy_bottom) = overlay_coords(
                        overlay,
                        tx,
                        ty,
                        display_width,
                        display_height,
                    );
                    top = overlay.composite(ox, oy_top, top);
                    bottom = overlay.composite(ox, oy_bottom, bottom);
                }

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(Color::Rgb(top.0, top.1, top.2));
                    cell.set_bg(Color::Rgb(bottom.0, bottom.1, bottom.2));
                }
            }
        }
    }
}

/// Map a cell to overlay pixels, tolerating a stale overlay size
fn overlay_coords(
    overlay: &OverlayFrame,
    tx: u16,
    ty: u16,
    display_width: u16,
    display_height: u16,
) -> (u32, u32, u32) {
    let sx = overlay.width as f64 / display_width as f64;
    let sy = overlay.height as f64 / (display_height as f64 * 2.0);
    (
        (tx as f64 * sx) as u32,
        (ty as f64 * 2.0 * sy) as u32,
        ((ty as f64 * 2.0 + 1.0) * sy) as u32,
    )
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
    color: Color,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(self.color);
            }
        }

        // Render text, cut on a char boundary
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(self.color),
        );
    }
}
