// SPDX-License-Identifier: GPL-3.0-only

//! RGBA drawing surface for the overlay layer
//!
//! Straight (non-premultiplied) alpha. Writes outside the surface are
//! clipped silently.

/// Transparent RGBA canvas the renderer paints into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlaySurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Match the surface to new viewport dimensions, discarding content
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; (width as usize) * (height as usize) * 4];
    }

    /// Reset every pixel to fully transparent
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Read one pixel; out of range reads are transparent
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let idx = self.index(x, y);
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Composite `color` over the existing pixel
    pub fn blend_pixel(&mut self, x: i64, y: i64, color: [u8; 4]) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let idx = self.index(x as u32, y as u32);
        let dst = [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ];
        let out = blend_over(color, dst);
        self.pixels[idx..idx + 4].copy_from_slice(&out);
    }

    /// Fill an axis-aligned rectangle, clipped to the surface
    pub fn fill_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: [u8; 4]) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + width as i64).min(self.width as i64);
        let y1 = (y + height as i64).min(self.height as i64);

        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, color);
            }
        }
    }

    /// Stroke an axis-aligned ellipse outline
    ///
    /// Uses the first-order distance estimate |f| / |∇f| of the implicit
    /// ellipse equation, which is accurate enough for thin strokes.
    pub fn stroke_ellipse(
        &mut self,
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        stroke: f32,
        color: [u8; 4],
    ) {
        if rx <= 0.0 || ry <= 0.0 {
            return;
        }
        let half = stroke / 2.0;
        let x0 = (cx - rx - half).floor() as i64;
        let x1 = (cx + rx + half).ceil() as i64;
        let y0 = (cy - ry - half).floor() as i64;
        let y1 = (cy + ry + half).ceil() as i64;

        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let f = (dx * dx) / (rx * rx) + (dy * dy) / (ry * ry) - 1.0;
                let gx = 2.0 * dx / (rx * rx);
                let gy = 2.0 * dy / (ry * ry);
                let grad = (gx * gx + gy * gy).sqrt();
                if grad == 0.0 {
                    continue;
                }
                if (f / grad).abs() <= half {
                    self.blend_pixel(px, py, color);
                }
            }
        }
    }

    /// Whether any pixel in the row carries coverage
    pub fn row_has_coverage(&self, y: u32) -> bool {
        if y >= self.height {
            return false;
        }
        let start = self.index(0, y);
        let end = start + self.width as usize * 4;
        self.pixels[start..end].chunks_exact(4).any(|px| px[3] > 0)
    }

    /// Whether the surface is fully transparent
    pub fn is_clear(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }
}

/// Porter-Duff "over" for straight-alpha RGBA
pub fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return [0; 4];
    }

    let mut out = [0u8; 4];
    for c in 0..3 {
        let s = src[c] as f32 * sa;
        let d = dst[c] as f32 * da * (1.0 - sa);
        out[c] = ((s + d) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round() as u8;
    out
}
