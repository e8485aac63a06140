use crate::{
    blur::{self, GaussianKernel},
    color::Color,
    error::{MediaError, MediaResult},
    layout,
    surface::{LinearGradient, Surface},
    text::{PlacedLine, TextPainter},
    timeline,
};

/// Horizontal text margin in pixels; lines may use `width - 2 * TEXT_MARGIN_X`.
pub const TEXT_MARGIN_X: f32 = 40.0;
/// Height budget per line used to centre the block vertically.
pub const LINE_BLOCK_PX: f32 = 32.0;
/// Distance between consecutive baselines.
pub const LINE_PITCH_PX: f32 = 36.0;

const SHADOW_ALPHA: u8 = 0x88;
const SHADOW_BLUR_RADIUS: u32 = 8;
const SHADOW_BLUR_SIGMA: f32 = 4.0;

/// What a single rendered frame showed.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameInfo {
    pub hue: f64,
    pub revealed_chars: usize,
    pub lines: Vec<String>,
}

pub fn background_color(hue: f64) -> Color {
    Color::hsl(hue, 0.65, 0.14)
}

pub fn overlay_gradient(hue: f64, width: u32, height: u32) -> LinearGradient {
    LinearGradient {
        start: (0.0, 0.0),
        end: (f64::from(width), f64::from(height)),
        from: Color::hsla(hue + 60.0, 0.7, 0.6, 0.35),
        to: Color::hsla(hue + 180.0, 0.7, 0.5, 0.35),
    }
}

/// Baseline positions for `lines` centred around the middle of a `height`-tall surface.
pub fn place_lines(lines: Vec<String>, height: u32) -> Vec<PlacedLine> {
    let top = height as f32 / 2.0 - (lines.len() as f32 * LINE_BLOCK_PX) / 2.0;
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| PlacedLine {
            text,
            x: TEXT_MARGIN_X,
            baseline: top + i as f32 * LINE_PITCH_PX,
        })
        .collect()
}

/// Draws the animated background and the typewriter text reveal.
pub struct FrameRenderer {
    painter: Box<dyn TextPainter>,
    text_layer: Surface,
    shadow_kernel: GaussianKernel,
    shadow_mask: Vec<u8>,
    scratch: Vec<u8>,
}

impl FrameRenderer {
    pub fn new(painter: Box<dyn TextPainter>, width: u32, height: u32) -> MediaResult<Self> {
        Ok(Self {
            painter,
            text_layer: Surface::new(width, height)?,
            shadow_kernel: GaussianKernel::new(SHADOW_BLUR_RADIUS, SHADOW_BLUR_SIGMA)?,
            shadow_mask: Vec::new(),
            scratch: Vec::new(),
        })
    }

    /// Render the frame at `elapsed_ms` of a `target_ms` reveal of `text` onto `surface`.
    pub fn render(
        &mut self,
        surface: &mut Surface,
        elapsed_ms: f64,
        text: &str,
        target_ms: f64,
    ) -> MediaResult<FrameInfo> {
        if surface.width() != self.text_layer.width()
            || surface.height() != self.text_layer.height()
        {
            return Err(MediaError::validation(format!(
                "frame renderer sized {}x{} cannot draw onto {}x{}",
                self.text_layer.width(),
                self.text_layer.height(),
                surface.width(),
                surface.height()
            )));
        }
        let (width, height) = (surface.width(), surface.height());

        let hue = timeline::background_hue(elapsed_ms);
        surface.fill(background_color(hue));
        surface.fill_linear_gradient(&overlay_gradient(hue, width, height));

        let shown = timeline::revealed_text(timeline::truncate_prompt(text), elapsed_ms, target_ms);
        let max_width = width as f32 - 2.0 * TEXT_MARGIN_X;
        let painter = &mut self.painter;
        let lines = layout::wrap_lines(shown, max_width, |s| painter.measure(s));
        let info = FrameInfo {
            hue,
            revealed_chars: shown.chars().count(),
            lines: lines.clone(),
        };
        if lines.is_empty() {
            return Ok(info);
        }

        let placed = place_lines(lines, height);
        self.text_layer.clear();
        self.painter
            .paint_lines(&mut self.text_layer, &placed, Color::WHITE)?;

        self.draw_shadow(surface)?;
        surface.draw_layer(&self.text_layer)?;
        Ok(info)
    }

    /// Blurred black copy of the text coverage, limited to the rows around the ink.
    fn draw_shadow(&mut self, surface: &mut Surface) -> MediaResult<()> {
        let Some((first, last)) = self.text_layer.ink_rows() else {
            return Ok(());
        };
        let pad = 2 * SHADOW_BLUR_RADIUS;
        let rows = first.saturating_sub(pad)..(last + 1 + pad).min(surface.height());

        let band = self
            .text_layer
            .rows(rows.clone())
            .ok_or_else(|| MediaError::validation("shadow band outside the text layer"))?;
        self.shadow_mask.clear();
        for px in band.chunks_exact(4) {
            self.shadow_mask.push(shadow_coverage(px[3]));
        }

        blur::blur_mask(
            &mut self.shadow_mask,
            surface.width() as usize,
            &self.shadow_kernel,
            &mut self.scratch,
        )?;
        surface.darken_rows(rows, &self.shadow_mask)
    }
}

fn shadow_coverage(text_alpha: u8) -> u8 {
    ((u32::from(text_alpha) * u32::from(SHADOW_ALPHA) + 127) / 255) as u8
}
