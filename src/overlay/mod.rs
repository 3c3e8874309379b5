// SPDX-License-Identifier: GPL-3.0-only

//! Scanning overlay drawn above the camera preview
//!
//! While the camera is idle-but-active the overlay shows a targeting guide
//! (an elliptical reticle and four corner brackets). While a capture is
//! being analyzed it shows a sweeping scan band instead. The two are never
//! drawn in the same redraw.
//!
//! Frames are plain RGBA with straight alpha and are published through a
//! watch channel by [`RenderLoop`]; front-ends composite them over the
//! preview themselves.

mod render_loop;
mod renderer;
mod surface;

pub use render_loop::{OverlaySender, RenderLoop};
pub use renderer::{OverlayMode, OverlayRenderer, ScanLine};
pub use surface::{OverlaySurface, blend_over};

use std::sync::Arc;

/// Size of the preview area the overlay covers, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(
            crate::constants::capture::PREFERRED_WIDTH,
            crate::constants::capture::PREFERRED_HEIGHT,
        )
    }
}

/// One finished overlay redraw
#[derive(Debug, Clone)]
pub struct OverlayFrame {
    pub width: u32,
    pub height: u32,
    /// Straight-alpha RGBA, row-major, no padding
    pub pixels: Arc<[u8]>,
    pub mode: OverlayMode,
    /// Redraw counter of the producing loop
    pub sequence: u64,
}

impl OverlayFrame {
    /// Copy the surface into an immutable frame
    pub fn capture(surface: &OverlaySurface, mode: OverlayMode, sequence: u64) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            pixels: Arc::from(surface.pixels()),
            mode,
            sequence,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Overlay pixel (x, y) composited over an opaque preview colour
    pub fn composite(&self, x: u32, y: u32, base: (u8, u8, u8)) -> (u8, u8, u8) {
        let px = self.pixel(x, y);
        if px[3] == 0 {
            return base;
        }
        let out = blend_over(px, [base.0, base.1, base.2, 255]);
        (out[0], out[1], out[2])
    }
}
