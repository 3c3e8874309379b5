// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for scanner operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Running a single headless scan

use chrono::Local;
use skin_scanner::app::{AnalysisResult, ScanListener, Scanner, UserIdentity};
use skin_scanner::backends::camera::{
    CameraBackend, CameraBackendType, StillImageBackend, V4l2Backend, get_backend,
};
use skin_scanner::config::Config;
use skin_scanner::constants::timing::{FIRST_FRAME_TIMEOUT, WARMUP};
use skin_scanner::pipelines::analyze::{EncodedScan, ScanOutcome};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

/// Load the config file, falling back to defaults when it is unreadable
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let loaded = match path {
        // An explicitly named file must parse
        Some(path) => return Ok(Config::load_from(path)?),
        None => Config::load(),
    };

    Ok(loaded.unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring unreadable config, using defaults");
        Config::default()
    }))
}

/// Pick the frame source for a command
pub fn open_backend(
    config: &Config,
    camera_index: Option<usize>,
    image: Option<&Path>,
) -> Result<Box<dyn CameraBackend>, Box<dyn std::error::Error>> {
    if let Some(path) = image {
        return Ok(Box::new(StillImageBackend::from_path(path)?));
    }

    if config.backend == CameraBackendType::StillImage {
        return Err("The still image backend needs --image".into());
    }

    let Some(index) = camera_index else {
        return Ok(get_backend());
    };

    let cameras = get_backend().enumerate_cameras();
    if cameras.is_empty() {
        return Err("No cameras found".into());
    }

    if index >= cameras.len() {
        return Err(format!(
            "Camera index {} out of range (0-{})",
            index,
            cameras.len() - 1
        )
        .into());
    }

    let camera = &cameras[index];
    println!("Using camera: {}", camera.name);
    Ok(Box::new(V4l2Backend::with_device_path(&camera.path)))
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let cameras = get_backend().enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {}", index, camera.name);
        println!("      Path: {}", camera.path);
        if let Some(info) = &camera.device_info {
            println!("      Driver: {}", info.driver);
        }
        println!();
    }

    Ok(())
}

/// Remembers the payload so it can be written out after the scan
#[derive(Default)]
struct SnapshotKeeper {
    scan: Mutex<Option<EncodedScan>>,
}

impl ScanListener for SnapshotKeeper {
    fn on_analysis_complete(&self, _result: AnalysisResult) {}

    fn on_scan_image_captured(&self, scan: &EncodedScan) {
        *self.scan.lock().unwrap_or_else(|e| e.into_inner()) = Some(scan.clone());
    }
}

/// Capture one frame, analyze it and print the result
pub fn scan(
    config: Config,
    backend: Box<dyn CameraBackend>,
    snapshot: Option<PathBuf>,
    user: Option<UserIdentity>,
) -> Result<(), Box<dyn std::error::Error>> {
    let warmup = if backend.backend_type() == CameraBackendType::StillImage {
        Duration::ZERO
    } else {
        WARMUP
    };

    let keeper = Arc::new(SnapshotKeeper::default());
    let rt = tokio::runtime::Runtime::new()?;

    let outcome = rt.block_on(async {
        let mut builder = Scanner::builder(config, backend).listener(keeper.clone());
        if let Some(user) = user {
            builder = builder.user(user);
        }
        let scanner = builder.build()?;

        let format = scanner.start_camera()?;
        println!("Capture format: {}", format);

        if scanner.wait_for_preview(FIRST_FRAME_TIMEOUT).await.is_none() {
            return Err("Camera produced no frames".into());
        }
        // Let exposure settle before capturing
        tokio::time::sleep(warmup).await;

        println!("Analyzing...");
        let outcome = scanner
            .capture_and_analyze()
            .await
            .ok_or("Failed to capture frame from camera")??;

        scanner.shutdown();
        Ok::<_, Box<dyn std::error::Error>>(outcome)
    })?;

    if let Some(path) = snapshot {
        let saved = keeper.scan.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(scan) = saved {
            let path = write_snapshot(&scan, path)?;
            println!("Snapshot saved: {}", path.display());
        }
    }

    match outcome {
        ScanOutcome::Primary { result, .. } => {
            println!("{}", serde_json::to_string_pretty(result.as_json())?);
            Ok(())
        }
        ScanOutcome::Fallback {
            result,
            primary_error,
            ..
        } => {
            eprintln!("Primary analysis failed ({}), result from fallback", primary_error);
            println!("{}", serde_json::to_string_pretty(result.as_json())?);
            Ok(())
        }
        ScanOutcome::Failed {
            primary_error,
            fallback_error,
        } => Err(format!("Analysis failed: {}; {}", primary_error, fallback_error).into()),
    }
}

/// Write the JPEG; a directory gets a timestamped file name
fn write_snapshot(scan: &EncodedScan, path: PathBuf) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = if path.is_dir() {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        path.join(format!("scan_{}.jpg", timestamp))
    } else {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        path
    };

    std::fs::write(&path, scan.jpeg_bytes()?)?;
    info!(path = %path.display(), bytes = scan.jpeg_size, "Snapshot written");
    Ok(path)
}
