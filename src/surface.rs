use std::ops::Range;

use crate::{
    color::{Color, PremulRgba8},
    composite,
    error::{MediaError, MediaResult},
};

/// CPU drawing surface holding row-major premultiplied RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Two-stop linear gradient between two points in surface pixel space.
#[derive(Clone, Copy, Debug)]
pub struct LinearGradient {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub from: Color,
    pub to: Color,
}

impl Surface {
    /// Allocate a transparent surface.
    ///
    /// Fails with [`MediaError::CapabilityUnavailable`] when no rasterizer can draw at this
    /// size (zero or wider/taller than the CPU rasterizer's 16-bit coordinate space).
    pub fn new(width: u32, height: u32) -> MediaResult<Self> {
        if width == 0 || height == 0 {
            return Err(MediaError::capability(format!(
                "cannot create a {width}x{height} drawing surface"
            )));
        }
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(MediaError::capability(format!(
                "drawing surface {width}x{height} exceeds {max}x{max}",
                max = u16::MAX
            )));
        }
        Ok(Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<PremulRgba8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.data[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Replace every pixel with `color`.
    pub fn fill(&mut self, color: Color) {
        let px = color.to_premul_rgba8();
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&px);
        }
    }

    /// Composite a full-surface linear gradient over the current contents.
    ///
    /// Each pixel centre is projected onto the gradient axis; positions before the start or
    /// past the end take the nearest stop colour.
    pub fn fill_linear_gradient(&mut self, gradient: &LinearGradient) {
        let (x0, y0) = gradient.start;
        let (dx, dy) = (gradient.end.0 - x0, gradient.end.1 - y0);
        let len_sq = dx * dx + dy * dy;
        let w = self.width as usize;

        for (i, d) in self.data.chunks_exact_mut(4).enumerate() {
            let px = (i % w) as f64 + 0.5;
            let py = (i / w) as f64 + 0.5;
            let t = if len_sq <= f64::EPSILON {
                0.0
            } else {
                ((px - x0) * dx + (py - y0) * dy) / len_sq
            };
            let src = gradient.from.lerp(gradient.to, t).to_premul_rgba8();
            let out = composite::over([d[0], d[1], d[2], d[3]], src);
            d.copy_from_slice(&out);
        }
    }

    /// Composite `layer` (same size) over this surface.
    pub fn draw_layer(&mut self, layer: &Surface) -> MediaResult<()> {
        if layer.width != self.width || layer.height != self.height {
            return Err(MediaError::validation(format!(
                "layer size mismatch: got {}x{}, expected {}x{}",
                layer.width, layer.height, self.width, self.height
            )));
        }
        composite::over_in_place(&mut self.data, &layer.data)
    }

    /// Pixels of the full-width row band `rows`.
    pub fn rows(&self, rows: Range<u32>) -> Option<&[u8]> {
        let stride = self.width as usize * 4;
        let band = rows.start as usize * stride..rows.end as usize * stride;
        self.data.get(band)
    }

    /// Composite black over the row band `rows`, one coverage byte per pixel in `mask`.
    pub fn darken_rows(&mut self, rows: Range<u32>, mask: &[u8]) -> MediaResult<()> {
        let stride = self.width as usize * 4;
        let band = rows.start as usize * stride..rows.end as usize * stride;
        let Some(pixels) = self.data.get_mut(band) else {
            return Err(MediaError::validation(format!(
                "rows {rows:?} are outside a surface {} rows tall",
                self.height
            )));
        };
        composite::darken_in_place(pixels, mask)
    }

    /// Rows `[first, last]` containing at least one non-transparent pixel.
    pub fn ink_rows(&self) -> Option<(u32, u32)> {
        let stride = self.width as usize * 4;
        let has_ink = |row: &[u8]| row.chunks_exact(4).any(|px| px[3] != 0);
        let first = self.data.chunks_exact(stride).position(has_ink)?;
        let last = self.data.chunks_exact(stride).rposition(has_ink)?;
        Some((first as u32, last as u32))
    }

    /// Copy of the pixels flattened over black with alpha forced to 255.
    pub fn to_opaque_rgba8(&self) -> MediaResult<Vec<u8>> {
        let mut out = vec![0u8; self.data.len()];
        composite::flatten_to_opaque_rgba8(&mut out, &self.data, [0, 0, 0])?;
        Ok(out)
    }
}
