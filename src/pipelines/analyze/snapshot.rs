// SPDX-License-Identifier: GPL-3.0-only

//! Frame snapshot and payload encoding
//!
//! A snapshot is a packed RGBA copy of the preview frame taken at capture
//! time. It is encoded once to JPEG, wrapped in a base64 data URI and then
//! dropped.

use crate::backends::camera::CameraFrame;
use crate::constants::EncodingQuality;
use crate::constants::endpoints::JPEG_DATA_URI_PREFIX;
use crate::errors::CaptureError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use tracing::{debug, info};

/// Same-sized RGBA copy of one preview frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA
    pub rgba: Vec<u8>,
}

impl Snapshot {
    /// Copy the frame pixel for pixel, dropping any row padding
    pub fn from_frame(frame: &CameraFrame) -> Result<Self, CaptureError> {
        if !frame.is_well_formed() {
            return Err(CaptureError::InvalidFrame(format!(
                "{}x{} frame with {} bytes (stride {})",
                frame.width,
                frame.height,
                frame.data.len(),
                frame.stride
            )));
        }

        Ok(Self {
            width: frame.width,
            height: frame.height,
            rgba: frame.to_rgba_vec(),
        })
    }

    /// Drop the alpha channel for JPEG
    fn into_rgb(self) -> Result<RgbImage, CaptureError> {
        let rgb: Vec<u8> = self
            .rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect();
        RgbImage::from_raw(self.width, self.height, rgb).ok_or_else(|| {
            CaptureError::InvalidFrame(format!(
                "buffer does not match {}x{}",
                self.width, self.height
            ))
        })
    }
}

/// JPEG payload of one capture, as sent to the analysis service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedScan {
    /// `data:image/jpeg;base64,...`
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// Size of the JPEG before base64
    pub jpeg_size: usize,
}

impl EncodedScan {
    /// Wrap raw JPEG bytes in a data URI
    pub fn from_jpeg(jpeg: &[u8], width: u32, height: u32) -> Self {
        Self {
            data_uri: format!("{}{}", JPEG_DATA_URI_PREFIX, STANDARD.encode(jpeg)),
            width,
            height,
            jpeg_size: jpeg.len(),
        }
    }

    /// Decode the JPEG bytes back out of the data URI
    pub fn jpeg_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        let encoded = self
            .data_uri
            .strip_prefix(JPEG_DATA_URI_PREFIX)
            .ok_or_else(|| CaptureError::EncodingFailed("not a JPEG data URI".to_string()))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| CaptureError::EncodingFailed(e.to_string()))
    }
}

/// Encodes snapshots to the JPEG data URI payload
#[derive(Debug, Clone, Copy)]
pub struct ScanEncoder {
    quality: EncodingQuality,
}

impl ScanEncoder {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> EncodingQuality {
        self.quality
    }

    /// Encode on the blocking pool
    pub async fn encode(&self, snapshot: Snapshot) -> Result<EncodedScan, CaptureError> {
        info!(
            width = snapshot.width,
            height = snapshot.height,
            quality = self.quality.jpeg_quality(),
            "Encoding scan payload"
        );

        let quality = self.quality;
        tokio::task::spawn_blocking(move || Self::encode_blocking(snapshot, quality))
            .await
            .map_err(|e| CaptureError::EncodingFailed(format!("Encoding task error: {}", e)))?
    }

    /// Encode on the calling thread
    pub fn encode_blocking(
        snapshot: Snapshot,
        quality: EncodingQuality,
    ) -> Result<EncodedScan, CaptureError> {
        let (width, height) = (snapshot.width, snapshot.height);
        let jpeg = encode_jpeg(snapshot.into_rgb()?, quality)?;
        debug!(size = jpeg.len(), "JPEG encoding complete");
        Ok(EncodedScan::from_jpeg(&jpeg, width, height))
    }
}

fn encode_jpeg(image: RgbImage, quality: EncodingQuality) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| CaptureError::EncodingFailed(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(width: u32, height: u32) -> CameraFrame {
        let data: Vec<u8> = (0..width * height)
            .flat_map(|i| [(i % 255) as u8, 100, 200, 255])
            .collect();
        CameraFrame::from_rgba(width, height, data)
    }

    #[test]
    fn snapshot_matches_frame_size() {
        let snapshot = Snapshot::from_frame(&frame(8, 6)).unwrap();
        assert_eq!((snapshot.width, snapshot.height), (8, 6));
        assert_eq!(snapshot.rgba.len(), 8 * 6 * 4);
        assert_eq!(&snapshot.rgba[4..8], &[1, 100, 200, 255]);
    }

    #[test]
    fn snapshot_rejects_truncated_frame() {
        let bad = CameraFrame {
            data: Arc::from(vec![0u8; 3].into_boxed_slice()),
            captured_at: Instant::now(),
            ..frame(2, 2)
        };
        assert!(matches!(
            Snapshot::from_frame(&bad),
            Err(CaptureError::InvalidFrame(_))
        ));
    }

    #[tokio::test]
    async fn encodes_decodable_jpeg_data_uri() {
        let snapshot = Snapshot::from_frame(&frame(32, 16)).unwrap();
        let encoded = ScanEncoder::new(EncodingQuality::Medium)
            .encode(snapshot)
            .await
            .unwrap();

        assert!(encoded.data_uri.starts_with("data:image/jpeg;base64,"));
        let jpeg = encoded.jpeg_bytes().unwrap();
        assert_eq!(jpeg.len(), encoded.jpeg_size);

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));
    }
}
