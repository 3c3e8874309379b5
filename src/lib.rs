// SPDX-License-Identifier: MPL-2.0

//! Skin Scanner - camera capture with a scanning overlay and remote analysis
//!
//! This library captures a frame from the user's camera, draws a targeting
//! overlay over the live preview and submits the frame to a remote image
//! analysis service, falling back to a second service when the first fails.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`app`]: The `Scanner` facade and its session state
//! - [`backends`]: Camera backend abstraction (V4L2, still image)
//! - [`session`]: Stream lifecycle and the preview surface
//! - [`overlay`]: Reticle, corner brackets and scan band rendering
//! - [`pipelines`]: Snapshot, encoding and the analysis round trip
//! - [`history`]: Saving results of signed-in users
//! - [`notifications`]: User-facing success and error messages
//! - [`config`]: User configuration handling
//! - [`terminal`]: Interactive terminal front-end
//!
//! # Example
//!
//! ```ignore
//! let scanner = Scanner::builder(Config::default(), get_backend()).build()?;
//! scanner.start_camera()?;
//! if let Some(Ok(outcome)) = scanner.capture_and_analyze().await {
//!     println!("{:?}", outcome.result());
//! }
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod history;
pub mod notifications;
pub mod overlay;
pub mod pipelines;
pub mod session;
pub mod terminal;

// Re-export commonly used types
pub use app::{AnalysisResult, ScanListener, ScanProgress, Scanner, SessionState, UserIdentity};
pub use config::Config;
pub use errors::{AppError, AppResult};
