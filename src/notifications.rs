// SPDX-License-Identifier: GPL-3.0-only

//! User-facing notifications (toasts)

use std::fmt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A short message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }

    /// Camera stream attached
    pub fn camera_started() -> Self {
        Self::success("Camera started", "Position your skin in the frame and scan")
    }

    /// Camera could not be opened
    pub fn camera_unavailable(reason: impl fmt::Display) -> Self {
        Self::error(
            "Camera error",
            format!(
                "Could not access camera. Please check permissions and that no other application is using it. ({})",
                reason
            ),
        )
    }

    /// Stream ended while the camera was on
    pub fn camera_lost(reason: impl fmt::Display) -> Self {
        Self::error(
            "Camera error",
            format!("The camera stopped sending video ({}). Start it again to continue.", reason),
        )
    }

    /// Primary endpoint failed, fallback about to run
    pub fn analysis_failed(reason: impl fmt::Display) -> Self {
        Self::error(
            "Analysis failed",
            format!("Could not reach the analysis service: {}", reason),
        )
    }

    /// Primary endpoint answered
    pub fn analysis_complete() -> Self {
        Self::success("Analysis complete", "Your skin scan results are ready")
    }

    /// Fallback endpoint answered
    pub fn fallback_complete() -> Self {
        Self::success(
            "Analysis complete (fallback)",
            "Results were produced by the fallback analysis service",
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

/// Sink for user notifications
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                info!(title = %notification.title, "{}", notification.description)
            }
            NotificationKind::Error => {
                error!(title = %notification.title, "{}", notification.description)
            }
        }
    }
}

/// Forwards notifications to a UI over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            warn!("Notification receiver dropped");
        }
    }
}
