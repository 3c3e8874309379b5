// SPDX-License-Identifier: MPL-2.0

//! Processing pipelines
//!
//! Heavy work (JPEG encoding) runs on the blocking pool and network calls
//! run as async tasks, so the live preview and the overlay keep updating
//! while a scan is in flight.
//!
//! # Modules
//!
//! - [`analyze`]: snapshot, encode and submit a frame for skin analysis

pub mod analyze;
