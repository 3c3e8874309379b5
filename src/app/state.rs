// SPDX-License-Identifier: GPL-3.0-only

//! Session state and the boundary types shared with callers

use crate::constants::progress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Progress of one capture attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanProgress {
    /// 0..=100
    pub percent: u8,
    pub stage: String,
}

impl ScanProgress {
    fn at(percent: u8, stage: &str) -> Self {
        Self {
            percent,
            stage: stage.to_string(),
        }
    }

    pub fn capturing() -> Self {
        Self::at(progress::CAPTURING, progress::CAPTURING_STAGE)
    }

    pub fn preparing() -> Self {
        Self::at(progress::PREPARING, progress::PREPARING_STAGE)
    }

    pub fn analyzing() -> Self {
        Self::at(progress::ANALYZING, progress::ANALYZING_STAGE)
    }

    pub fn complete() -> Self {
        Self::at(progress::COMPLETE, progress::COMPLETE_STAGE)
    }
}

impl fmt::Display for ScanProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}% {}", self.percent, self.stage)
    }
}

/// Lifecycle of the scanner
///
/// Analysis and completion only exist while the camera is streaming, so
/// a single enum covers every valid combination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    /// No camera stream
    #[default]
    Idle,
    /// Streaming, ready to capture
    Active,
    /// A capture is being analyzed
    Analyzing(ScanProgress),
    /// The last capture produced a result; another capture may follow
    Complete,
}

impl SessionState {
    pub fn is_camera_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }

    pub fn is_analyzing(&self) -> bool {
        matches!(self, SessionState::Analyzing(_))
    }

    /// Whether a new capture may start from this state
    pub fn can_capture(&self) -> bool {
        matches!(self, SessionState::Active | SessionState::Complete)
    }

    pub fn progress(&self) -> Option<&ScanProgress> {
        match self {
            SessionState::Analyzing(progress) => Some(progress),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Active => "Ready",
            SessionState::Analyzing(_) => "Analyzing",
            SessionState::Complete => "Complete",
        }
    }
}

/// Signed-in user, when there is one
///
/// Only used to decide whether results go to the history service and to
/// authenticate that write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl UserIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_allowed_only_from_ready_states() {
        assert!(!SessionState::Idle.can_capture());
        assert!(SessionState::Active.can_capture());
        assert!(SessionState::Complete.can_capture());
        assert!(!SessionState::Analyzing(ScanProgress::capturing()).can_capture());
    }

    #[test]
    fn only_idle_has_no_camera() {
        assert!(!SessionState::Idle.is_camera_active());
        assert!(SessionState::Analyzing(ScanProgress::analyzing()).is_camera_active());
        assert!(SessionState::Complete.is_camera_active());
    }

    #[test]
    fn progress_stages_match_checkpoints() {
        assert_eq!(ScanProgress::capturing().percent, 0);
        assert_eq!(ScanProgress::preparing().stage, "Preparing image for analysis");
        assert_eq!(ScanProgress::analyzing().to_string(), "50% Analyzing skin features");
        assert_eq!(ScanProgress::complete().percent, 100);
    }

    #[test]
    fn identity_deserializes_without_optionals() {
        let user: UserIdentity = serde_json::from_str(r#"{"id":"u1"}"#).unwrap();
        assert_eq!(user, UserIdentity::new("u1"));
    }
}
