// SPDX-License-Identifier: MPL-2.0

//! Scanner component
//!
//! # Architecture
//!
//! - `state`: Session state, scan progress and the user identity
//! - `listener`: Callbacks for results, payloads and progress
//! - `scanner`: The `Scanner` facade driving session, overlay and pipeline
//!
//! # State machine
//!
//! ```text
//! Idle ──start──▶ Active ──capture──▶ Analyzing ──result──▶ Complete
//!   ▲               ▲                     │                    │
//!   │               └──── both failed ────┘                    │
//!   │                                                          │
//!   └───────────────── stop (from any state) ◀─────────────────┘
//! ```
//!
//! `Complete` accepts another capture (rescan).

mod listener;
mod scanner;
mod state;

pub use crate::pipelines::analyze::AnalysisResult;
pub use listener::ScanListener;
pub use scanner::{CaptureResult, Scanner, ScannerBuilder};
pub use state::{ScanProgress, SessionState, UserIdentity};
