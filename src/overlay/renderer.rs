// SPDX-License-Identifier: GPL-3.0-only

//! Overlay drawing: the targeting guide and the scan band

use super::surface::OverlaySurface;
use crate::constants::overlay::*;

/// What the last redraw painted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayMode {
    /// Reticle plus corner brackets
    Guide,
    /// Horizontal band at the given row
    Scanning { line: u32 },
}

/// Vertical position of the scan band
///
/// Advances a fixed step per redraw and wraps to the top once past the
/// bottom edge. Speed depends on the redraw rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanLine {
    position: u32,
}

impl ScanLine {
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Move one step, wrapping against `height`
    pub fn advance(&mut self, height: u32) {
        self.position += SCAN_BAND_STEP;
        if self.position > height {
            self.position = 0;
        }
    }

    fn clamp_to(&mut self, height: u32) {
        if self.position > height {
            self.position = 0;
        }
    }
}

/// Paints one overlay redraw into its surface
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    surface: OverlaySurface,
    scan_line: ScanLine,
    mode: OverlayMode,
}

impl OverlayRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            surface: OverlaySurface::new(width, height),
            scan_line: ScanLine::default(),
            mode: OverlayMode::Guide,
        }
    }

    pub fn surface(&self) -> &OverlaySurface {
        &self.surface
    }

    pub fn mode(&self) -> OverlayMode {
        self.mode
    }

    pub fn scan_line(&self) -> ScanLine {
        self.scan_line
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
        self.scan_line.clamp_to(height);
    }

    /// Clear and redraw for the current analysis state
    pub fn render(&mut self, analyzing: bool) -> OverlayMode {
        self.surface.clear();

        self.mode = if analyzing {
            let line = self.scan_line.position();
            self.draw_scan_band(line);
            self.scan_line.advance(self.surface.height());
            OverlayMode::Scanning { line }
        } else {
            self.draw_reticle();
            self.draw_brackets();
            OverlayMode::Guide
        };

        self.mode
    }

    fn draw_reticle(&mut self) {
        let w = self.surface.width() as f32;
        let h = self.surface.height() as f32;
        self.surface.stroke_ellipse(
            w / 2.0,
            h / 2.0,
            w * RETICLE_RADIUS_X,
            h * RETICLE_RADIUS_Y,
            RETICLE_STROKE,
            GUIDE_COLOR,
        );
    }

    /// Four L-shaped corners, two arms each, pointing into the frame
    fn draw_brackets(&mut self) {
        let w = self.surface.width() as i64;
        let h = self.surface.height() as i64;
        let inset = BRACKET_INSET as i64;
        let arm = BRACKET_ARM as i64;
        let t = BRACKET_THICKNESS;

        // (corner x, corner y, horizontal direction, vertical direction)
        let corners = [
            (inset, inset, 1, 1),
            (w - inset, inset, -1, 1),
            (inset, h - inset, 1, -1),
            (w - inset, h - inset, -1, -1),
        ];

        for (cx, cy, dx, dy) in corners {
            // Arms start at the corner and extend `arm` pixels inward
            let hx = if dx > 0 { cx } else { cx - arm };
            let vy = if dy > 0 { cy } else { cy - arm };
            let ty = if dy > 0 { cy } else { cy - t as i64 };
            let tx = if dx > 0 { cx } else { cx - t as i64 };

            self.surface.fill_rect(hx, ty, arm as u32, t, GUIDE_COLOR);
            self.surface.fill_rect(tx, vy, t, arm as u32, GUIDE_COLOR);
        }
    }

    fn draw_scan_band(&mut self, line: u32) {
        let width = self.surface.width();
        self.surface
            .fill_rect(0, line as i64, width, SCAN_BAND_HEIGHT, SCAN_BAND_COLOR);
    }
}
