// SPDX-License-Identifier: GPL-3.0-only

use super::ScanProgress;
use crate::pipelines::analyze::{AnalysisResult, EncodedScan};

/// Callbacks a front-end registers with the scanner
///
/// Called from tokio tasks; implementations must not block.
pub trait ScanListener: Send + Sync {
    /// A scan produced a result; called at most once per capture attempt
    fn on_analysis_complete(&self, result: AnalysisResult);

    /// The payload was encoded, before any network request
    fn on_scan_image_captured(&self, _scan: &EncodedScan) {}

    /// A progress checkpoint was reached
    fn on_progress(&self, _progress: &ScanProgress) {}
}
