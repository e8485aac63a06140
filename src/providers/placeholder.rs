use std::{
    io::Cursor,
    sync::{Arc, OnceLock},
};

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use regex::Regex;

use super::{ImageProvider, PromptImprover};
use crate::{
    error::{MediaError, MediaResult},
    layout::wrap_lines,
};

const EXTRAS: [&str; 4] = [
    "ultra-detailed, high dynamic range, 4k",
    "cinematic lighting, volumetric light",
    "rule of thirds composition, shallow depth of field",
    "physically-based rendering, photorealistic textures",
];
const STYLIZED: &str = "stylized, bold shapes, clean lines";
const PHOTOREAL: &str = "photorealistic, filmic, natural skin tones";

pub const PLACEHOLDER_SIZE: u32 = 1024;
const PLACEHOLDER_CHARS: usize = 160;
const PANEL_X: f32 = 64.0;
const PANEL_Y: f32 = 220.0;
const PANEL_W: f32 = 896.0;
const PANEL_H: f32 = 720.0;
const PANEL_PADDING: f32 = 16.0;
const BODY_FONT_PX: f32 = 28.0;
const BODY_LINE_HEIGHT: f32 = 1.3;
// Average advance of a sans-serif glyph, in ems.
const BODY_EM_ADVANCE: f32 = 0.55;

fn stylized_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)cartoon|anime|illustration|pixel|low poly")
            .expect("style regex should compile")
    })
}

/// Deterministic prompt rewrite used when no completion service is configured.
pub fn heuristic_improve(input: &str) -> String {
    let base = input.trim();
    if base.is_empty() {
        return String::new();
    }
    let style = if stylized_re().is_match(base) {
        STYLIZED
    } else {
        PHOTOREAL
    };
    format!("{base}, {style}, {}", EXTRAS.join(", "))
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HeuristicImprover;

#[async_trait]
impl PromptImprover for HeuristicImprover {
    async fn improve(&self, prompt: &str) -> MediaResult<String> {
        Ok(heuristic_improve(prompt))
    }
}

fn escape_xml_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// SVG document of the placeholder image: gradient backdrop, title, and the first characters
/// of the prompt in a translucent panel.
pub fn placeholder_svg(prompt: &str) -> String {
    let content: String = prompt
        .chars()
        .take(PLACEHOLDER_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();

    let advance = BODY_FONT_PX * BODY_EM_ADVANCE;
    let lines = wrap_lines(&content, PANEL_W - 2.0 * PANEL_PADDING, |s| {
        s.chars().count() as f32 * advance
    });

    let pitch = BODY_FONT_PX * BODY_LINE_HEIGHT;
    let first_baseline = PANEL_Y + PANEL_PADDING + BODY_FONT_PX;
    let body: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "<text x='{x}' y='{y}' font-size='{BODY_FONT_PX}' font-family='sans-serif' fill='white'>{}</text>\n",
                escape_xml_text(line),
                x = PANEL_X + PANEL_PADDING,
                y = first_baseline + i as f32 * pitch,
            )
        })
        .collect();

    format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{s}' height='{s}'>
<defs>
<linearGradient id='g' x1='0' y1='0' x2='1' y2='1'>
<stop offset='0%' stop-color='#343a7a'/>
<stop offset='100%' stop-color='#6b7cff'/>
</linearGradient>
</defs>
<rect width='100%' height='100%' fill='url(#g)'/>
<text x='64' y='160' font-size='48' font-family='sans-serif' fill='white'>Generated Placeholder</text>
<rect x='{PANEL_X}' y='{PANEL_Y}' width='{PANEL_W}' height='{PANEL_H}' rx='12' fill='#000' fill-opacity='0.15'/>
{body}</svg>",
        s = PLACEHOLDER_SIZE,
    )
}

fn system_fontdb() -> Arc<usvg::fontdb::Database> {
    static DB: OnceLock<Arc<usvg::fontdb::Database>> = OnceLock::new();
    DB.get_or_init(|| {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        Arc::new(db)
    })
    .clone()
}

/// Rasterize an SVG document to PNG bytes at its intrinsic size.
pub fn rasterize_svg_png(svg: &str, fontdb: Arc<usvg::fontdb::Database>) -> MediaResult<Vec<u8>> {
    let opts = usvg::Options {
        fontdb,
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &opts).context("parse placeholder svg")?;
    let size = tree.size().to_int_size();

    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| MediaError::capability("failed to allocate placeholder pixmap"))?;
    let identity = resvg::tiny_skia::Transform::default();
    resvg::render(&tree, identity, &mut pixmap.as_mut());

    let mut rgba = pixmap.take();
    unpremultiply_rgba8_in_place(&mut rgba);
    let img = image::RgbaImage::from_raw(size.width(), size.height(), rgba)
        .ok_or_else(|| MediaError::encode("placeholder buffer size mismatch"))?;

    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .context("encode placeholder png")?;
    Ok(png)
}

fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Local image provider producing a PNG data URI from [`placeholder_svg`].
#[derive(Clone, Debug, Default)]
pub struct PlaceholderImages;

#[async_trait]
impl ImageProvider for PlaceholderImages {
    #[tracing::instrument(skip_all)]
    async fn generate(&self, prompt: &str) -> MediaResult<String> {
        let svg = placeholder_svg(prompt);
        let png = tokio::task::spawn_blocking(move || rasterize_svg_png(&svg, system_fontdb()))
            .await
            .map_err(|e| MediaError::encode(format!("placeholder rasterizer panicked: {e}")))??;
        let b64 = base64::engine::general_purpose::STANDARD.encode(png);
        Ok(format!("data:image/png;base64,{b64}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompt_improves_to_empty() {
        assert_eq!(heuristic_improve("   \n"), "");
    }

    #[test]
    fn heuristic_appends_style_and_extras() {
        let out = heuristic_improve("  a red fox in snow ");
        assert!(out.starts_with("a red fox in snow, photorealistic, filmic"));
        assert!(out.ends_with("physically-based rendering, photorealistic textures"));

        let out = heuristic_improve("Anime girl on a rooftop");
        assert!(out.starts_with("Anime girl on a rooftop, stylized, bold shapes, clean lines, "));
        assert!(heuristic_improve("LOW POLY island").contains(STYLIZED));
    }

    #[test]
    fn placeholder_escapes_and_truncates() {
        let prompt = format!("<b>&\n{}", "x".repeat(400));
        let svg = placeholder_svg(&prompt);
        assert!(svg.contains("&lt;b&gt;&amp;"));
        assert!(!svg.contains("<b>"));
        assert!(svg.contains("Generated Placeholder"));
        assert!(svg.matches('x').count() < 200);
    }

    #[test]
    fn placeholder_rasterizes_to_png() {
        let db = Arc::new(usvg::fontdb::Database::new());
        let png = rasterize_svg_png(&placeholder_svg("a lighthouse"), db).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (PLACEHOLDER_SIZE, PLACEHOLDER_SIZE));
        // Gradient starts at #343a7a in the top-left corner.
        let p = img.get_pixel(0, 0).0;
        assert!(p[0].abs_diff(0x34) <= 2 && p[2].abs_diff(0x7a) <= 2);
    }

    #[tokio::test]
    async fn placeholder_provider_returns_png_data_uri() {
        let url = PlaceholderImages.generate("a lighthouse").await.unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}
