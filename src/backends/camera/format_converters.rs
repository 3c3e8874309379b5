// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for raw V4L2 buffers
//!
//! Every converter produces tightly packed RGBA so the preview surface
//! only ever holds one layout.

use tracing::warn;

/// FourCC codes the V4L2 backend knows how to decode, in preference order
pub const SUPPORTED_FOURCCS: [&[u8; 4]; 2] = [b"MJPG", b"YUYV"];

/// Convert YUYV (YUV 4:2:2) to RGBA
///
/// YUYV format: Y0 U0 Y1 V0 - each 4-byte group encodes 2 pixels.
/// Uses BT.601 coefficients for YUV to RGB conversion.
pub fn yuyv_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width * height) as usize;
    let mut rgba = Vec::with_capacity(pixel_count * 4);

    for chunk in data.chunks_exact(4) {
        let y0 = chunk[0];
        let u = chunk[1];
        let y1 = chunk[2];
        let v = chunk[3];

        for luma in [y0, y1] {
            if rgba.len() >= pixel_count * 4 {
                break;
            }
            let (r, g, b) = yuv_to_rgb(luma, u, v);
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }

    // Short buffers (truncated DMA transfers) are padded black
    if rgba.len() < pixel_count * 4 {
        rgba.resize(pixel_count * 4, 0);
    }

    rgba
}

/// Decode one MJPEG buffer to RGBA
///
/// Returns the decoded dimensions, which can differ from the negotiated
/// format on some UVC devices.
pub fn mjpeg_to_rgba(data: &[u8]) -> Option<(Vec<u8>, u32, u32)> {
    match image::load_from_memory_with_format(data, image::ImageFormat::Jpeg) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            Some((rgba.into_raw(), width, height))
        }
        Err(e) => {
            warn!(error = %e, len = data.len(), "Dropping undecodable MJPEG buffer");
            None
        }
    }
}

/// Convert YUV (BT.601) to RGB
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> (u8, u8, u8) {
    let y = y as f32;
    let u = u as f32 - 128.0;
    let v = v as f32 - 128.0;

    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;

    (r, g, b)
}
