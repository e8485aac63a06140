use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    color::Color,
    error::{MediaError, MediaResult},
    surface::Surface,
};

/// One line of text positioned on a surface. `baseline` is the alphabetic baseline, as with
/// canvas `fillText`.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub baseline: f32,
}

/// Measures and rasterizes single lines of text.
pub trait TextPainter: Send {
    /// Advance width of `text` in pixels.
    fn measure(&mut self, text: &str) -> f32;

    /// Draw `lines` in `color` onto the transparent `layer`.
    fn paint_lines(&mut self, layer: &mut Surface, lines: &[PlacedLine], color: Color)
    -> MediaResult<()>;
}

/// Builds a fresh painter for each render session.
pub type PainterFactory = Arc<dyn Fn() -> MediaResult<Box<dyn TextPainter>> + Send + Sync>;

/// Where the clip font comes from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FontSource {
    /// First sans-serif face found among the system fonts.
    #[default]
    System,
    /// A TrueType/OpenType file.
    File(PathBuf),
}

/// Raw font file contents plus the face index inside it.
#[derive(Clone)]
pub struct FontBytes {
    pub data: Arc<Vec<u8>>,
    pub index: u32,
}

impl std::fmt::Debug for FontBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontBytes")
            .field("len", &self.data.len())
            .field("index", &self.index)
            .finish()
    }
}

impl FontSource {
    pub fn load(&self) -> MediaResult<FontBytes> {
        match self {
            Self::File(path) => load_font_file(path),
            Self::System => load_system_sans(),
        }
    }
}

fn load_font_file(path: &Path) -> MediaResult<FontBytes> {
    let data = std::fs::read(path).map_err(|e| {
        MediaError::capability(format!("read font '{}': {e}", path.display()))
    })?;
    if data.is_empty() {
        return Err(MediaError::capability(format!("font file '{}' is empty", path.display())));
    }
    Ok(FontBytes {
        data: Arc::new(data),
        index: 0,
    })
}

fn load_system_sans() -> MediaResult<FontBytes> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();

    let query = usvg::fontdb::Query {
        families: &[usvg::fontdb::Family::SansSerif],
        weight: usvg::fontdb::Weight::BOLD,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|f| f.id))
        .ok_or_else(|| MediaError::capability("no system fonts available for text rendering"))?;

    db.with_face_data(id, |data, index| FontBytes {
        data: Arc::new(data.to_vec()),
        index,
    })
    .ok_or_else(|| MediaError::capability("system font face could not be loaded"))
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// Attributes that make parley resolve the exact face `vello_cpu` paints with.
#[derive(Clone, Copy, Debug, PartialEq)]
struct FaceAttrs {
    weight: parley::style::FontWeight,
    style: parley::style::FontStyle,
    width: parley::style::FontWidth,
}

/// Shapes text with Parley and rasterizes glyph runs with `vello_cpu`.
pub struct FontTextPainter {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    family: String,
    face: FaceAttrs,
    font: vello_cpu::peniko::FontData,
    size_px: f32,
}

impl FontTextPainter {
    pub fn new(font: &FontBytes, size_px: f32) -> MediaResult<Self> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(MediaError::validation("text size_px must be finite and > 0"));
        }

        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx.collection.register_fonts(
            parley::fontique::Blob::from(font.data.as_ref().clone()),
            None,
        );
        let (family_id, face) = families
            .iter()
            .find_map(|(id, faces)| {
                let info = faces.iter().find(|info| info.index() == font.index)?;
                let face = FaceAttrs {
                    weight: info.weight(),
                    style: info.style(),
                    width: info.width(),
                };
                Some((*id, face))
            })
            .ok_or_else(|| {
                MediaError::capability(format!("font bytes have no face at index {}", font.index))
            })?;
        let family = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| MediaError::capability("registered font family has no name"))?
            .to_string();

        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.data.as_ref().clone()),
            font.index,
        );

        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family,
            face,
            font,
            size_px,
        })
    }

    /// Factory that loads `source` once and hands every session its own painter.
    pub fn factory(source: FontSource, size_px: f32) -> PainterFactory {
        let loaded = std::sync::OnceLock::<FontBytes>::new();
        Arc::new(move || {
            let font = match loaded.get() {
                Some(font) => font.clone(),
                None => {
                    let font = source.load()?;
                    loaded.get_or_init(|| font).clone()
                }
            };
            Ok(Box::new(FontTextPainter::new(&font, size_px)?) as Box<dyn TextPainter>)
        })
    }

    fn layout(&mut self, text: &str, brush: TextBrushRgba8) -> parley::Layout<TextBrushRgba8> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(self.family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontWeight(self.face.weight));
        builder.push_default(parley::style::StyleProperty::FontStyle(self.face.style));
        builder.push_default(parley::style::StyleProperty::FontWidth(self.face.width));
        builder.push_default(parley::style::StyleProperty::FontSize(self.size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

impl TextPainter for FontTextPainter {
    fn measure(&mut self, text: &str) -> f32 {
        self.layout(text, TextBrushRgba8::default()).width()
    }

    fn paint_lines(
        &mut self,
        layer: &mut Surface,
        lines: &[PlacedLine],
        color: Color,
    ) -> MediaResult<()> {
        let [r, g, b, a] = straight_rgba8(color);
        let brush = TextBrushRgba8 { r, g, b, a };
        let width: u16 = layer
            .width()
            .try_into()
            .map_err(|_| MediaError::capability("text layer width exceeds u16"))?;
        let height: u16 = layer
            .height()
            .try_into()
            .map_err(|_| MediaError::capability("text layer height exceeds u16"))?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        for placed in lines {
            let layout = self.layout(&placed.text, brush);
            let ascent = layout
                .lines()
                .next()
                .map(|l| l.metrics().baseline)
                .unwrap_or(0.0);
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                f64::from(placed.x),
                f64::from(placed.baseline - ascent),
            )));

            for line in layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                    let mut pen_x = run.offset();
                    let baseline = run.baseline();
                    let glyphs = run.glyphs().map(|g| {
                        let glyph = vello_cpu::Glyph {
                            id: g.id,
                            x: pen_x + g.x,
                            y: baseline - g.y,
                        };
                        pen_x += g.advance;
                        glyph
                    });
                    ctx.glyph_run(&self.font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
        ctx.flush();

        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.render_to_pixmap(&mut pixmap);
        crate::composite::over_in_place(layer.data_mut(), pixmap.data_as_u8_slice())
    }
}

fn straight_rgba8(color: Color) -> [u8; 4] {
    let to_u8 = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
    [color.r, color.g, color.b, color.a].map(to_u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_painter() -> Option<FontTextPainter> {
        let font = FontSource::System.load().ok()?;
        FontTextPainter::new(&font, 28.0).ok()
    }

    #[test]
    fn missing_font_file_is_an_error() {
        let src = FontSource::File(PathBuf::from("target/definitely-missing-font.ttf"));
        assert!(src.load().is_err());
    }

    #[test]
    fn factory_surfaces_load_errors() {
        let factory =
            FontTextPainter::factory(FontSource::File(PathBuf::from("target/nope.ttf")), 28.0);
        assert!(factory().is_err());
    }

    #[test]
    fn rejects_non_positive_size() {
        let font = FontBytes {
            data: Arc::new(vec![0u8; 4]),
            index: 0,
        };
        assert!(matches!(
            FontTextPainter::new(&font, 0.0),
            Err(MediaError::Validation(_))
        ));
    }

    #[test]
    fn face_index_must_exist_in_the_font_data() {
        let Ok(font) = FontSource::System.load() else {
            eprintln!("skipping: no system font");
            return;
        };
        let painter = FontTextPainter::new(&font, 28.0).unwrap();
        assert_eq!(painter.font.index, font.index);

        let missing = FontBytes {
            index: 999,
            ..font
        };
        assert!(matches!(
            FontTextPainter::new(&missing, 28.0),
            Err(MediaError::CapabilityUnavailable(_))
        ));
    }

    #[test]
    fn measure_grows_with_text() {
        let Some(mut painter) = system_painter() else {
            eprintln!("skipping: no system font");
            return;
        };
        let short = painter.measure("sun");
        let long = painter.measure("sunrise over the city");
        assert!(short > 0.0);
        assert!(long > short);
    }

    #[test]
    fn paints_glyph_coverage_near_baseline() {
        let Some(mut painter) = system_painter() else {
            eprintln!("skipping: no system font");
            return;
        };
        let mut layer = Surface::new(200, 80).unwrap();
        painter
            .paint_lines(
                &mut layer,
                &[PlacedLine {
                    text: "Hello".to_string(),
                    x: 10.0,
                    baseline: 50.0,
                }],
                Color::WHITE,
            )
            .unwrap();
        let (top, bottom) = layer.ink_rows().expect("text should leave ink");
        assert!(top < 50 && bottom <= 60, "ink rows {top}..{bottom}");
    }
}
