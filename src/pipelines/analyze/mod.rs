// SPDX-License-Identifier: GPL-3.0-only

//! Capture and analyze pipeline
//!
//! ```text
//! ┌──────────────┐   ┌──────────┐   ┌────────────┐   ┌──────────┐
//! │ Preview frame│──▶│ Snapshot │──▶│ JPEG + b64 │──▶│ Primary  │──┐
//! └──────────────┘   └──────────┘   └────────────┘   └──────────┘  │ error
//!                                                                   ▼
//!                                                             ┌──────────┐
//!                                                             │ Fallback │
//!                                                             └──────────┘
//! ```
//!
//! The pipeline reports each checkpoint to a [`ScanObserver`] and returns
//! a [`ScanOutcome`]. State transitions, the completion grace delay and
//! history writes belong to the caller.

pub mod client;
pub mod snapshot;

pub use client::{AnalysisEndpoint, AnalysisRequest, AnalysisResult, HttpAnalysisEndpoint};
pub use snapshot::{EncodedScan, ScanEncoder, Snapshot};

use crate::app::ScanProgress;
use crate::backends::camera::CameraFrame;
use crate::config::Config;
use crate::errors::{AnalysisError, CaptureError};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Names used for the two endpoints in logs and errors
pub const PRIMARY: &str = "primary";
pub const FALLBACK: &str = "fallback";

/// Receives the checkpoints of one capture attempt
pub trait ScanObserver: Send + Sync {
    fn progress(&self, progress: ScanProgress);

    /// Payload is ready, called before any network request
    fn image_captured(&self, scan: &EncodedScan);

    /// The primary endpoint failed and the fallback is about to run
    fn primary_failed(&self, error: &AnalysisError);
}

/// How a capture attempt ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// The primary endpoint answered
    Primary {
        result: AnalysisResult,
        scan: EncodedScan,
    },
    /// The primary failed and the fallback answered
    Fallback {
        result: AnalysisResult,
        scan: EncodedScan,
        primary_error: AnalysisError,
    },
    /// Neither endpoint produced a result
    Failed {
        primary_error: AnalysisError,
        fallback_error: AnalysisError,
    },
}

impl ScanOutcome {
    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            ScanOutcome::Primary { result, .. } | ScanOutcome::Fallback { result, .. } => {
                Some(result)
            }
            ScanOutcome::Failed { .. } => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ScanOutcome::Fallback { .. })
    }
}

/// Snapshot, encode, then primary with fallback
#[derive(Clone)]
pub struct AnalyzePipeline {
    encoder: ScanEncoder,
    primary: Arc<dyn AnalysisEndpoint>,
    fallback: Arc<dyn AnalysisEndpoint>,
}

impl AnalyzePipeline {
    pub fn new(
        encoder: ScanEncoder,
        primary: Arc<dyn AnalysisEndpoint>,
        fallback: Arc<dyn AnalysisEndpoint>,
    ) -> Self {
        Self {
            encoder,
            primary,
            fallback,
        }
    }

    /// HTTP endpoints at the configured URLs
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let timeout = config.request_timeout();
        Ok(Self::new(
            ScanEncoder::new(config.encoding_quality),
            Arc::new(HttpAnalysisEndpoint::new(PRIMARY, &config.primary_url, timeout)?),
            Arc::new(HttpAnalysisEndpoint::new(FALLBACK, &config.fallback_url, timeout)?),
        ))
    }

    /// Run one capture attempt against `frame`
    ///
    /// Errors are limited to snapshot and encoding failures; endpoint
    /// failures are part of the outcome.
    pub async fn run(
        &self,
        frame: &CameraFrame,
        observer: &dyn ScanObserver,
    ) -> Result<ScanOutcome, CaptureError> {
        let snapshot = Snapshot::from_frame(frame)?;
        let scan = self.encoder.encode(snapshot).await?;
        observer.progress(ScanProgress::preparing());

        observer.image_captured(&scan);

        observer.progress(ScanProgress::analyzing());
        let request = AnalysisRequest::new(scan.data_uri.clone());

        let primary_error = match self.primary.analyze(&request).await {
            Ok(result) => {
                info!(endpoint = self.primary.name(), "Analysis succeeded");
                observer.progress(ScanProgress::complete());
                return Ok(ScanOutcome::Primary { result, scan });
            }
            Err(e) => e,
        };

        warn!(error = %primary_error, "Primary analysis failed, trying fallback");
        observer.primary_failed(&primary_error);

        match self.fallback.analyze(&request).await {
            Ok(result) => {
                info!(endpoint = self.fallback.name(), "Fallback analysis succeeded");
                observer.progress(ScanProgress::complete());
                Ok(ScanOutcome::Fallback {
                    result,
                    scan,
                    primary_error,
                })
            }
            Err(fallback_error) => {
                error!(error = %fallback_error, "Fallback analysis failed");
                Ok(ScanOutcome::Failed {
                    primary_error,
                    fallback_error,
                })
            }
        }
    }
}
