//! Raster utilities shared by the card layers.
//!
//! Vector work (circle clipping, text) is done with tiny-skia and resvg,
//! which operate on premultiplied pixmaps. The card canvas itself is a
//! straight-alpha [`RgbaImage`]; this module converts between the two and
//! composites finished overlays onto the canvas.

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{ColorU8, Pixmap, Transform};
use resvg::usvg::Tree;

use crate::font::FontSpec;

// ============================================================================
// SVG text markup
// ============================================================================

/// A single line of text positioned inside an SVG document.
#[derive(Debug, Clone, Copy)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub font: &'a FontSpec,
    pub size: f32,
    pub fill: [u8; 3],

    /// Left edge of the line.
    pub x: f32,
    /// Top edge of the line's em box.
    pub y: f32,
}

/// Builds a `width x height` SVG document holding one top-aligned text run.
pub fn text_run_svg(run: &TextRun<'_>, width: f32, height: f32) -> String {
    let weight = run
        .font
        .weight
        .map(|w| format!(r#" font-weight="{}""#, w.0))
        .unwrap_or_default();
    let [r, g, b] = run.fill;

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<text x="{x}" y="{y}" font-family="{family}" font-size="{size}"{weight} "#,
            r##"fill="#{r:02x}{g:02x}{b:02x}" dominant-baseline="text-before-edge" xml:space="preserve">"##,
            "{text}</text></svg>"
        ),
        w = width,
        h = height,
        x = run.x,
        y = run.y,
        family = escape_xml(&run.font.css_family()),
        size = run.size,
        weight = weight,
        r = r,
        g = g,
        b = b,
        text = escape_xml(run.text),
    )
}

/// Escapes text for use in SVG character data and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a parsed SVG tree at its natural size.
///
/// Returns `None` if the tree has a zero-sized canvas.
pub fn rasterize_tree(tree: &Tree) -> Option<RgbaImage> {
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())?;
    resvg::render(tree, Transform::default(), &mut pixmap.as_mut());
    Some(pixmap_to_rgba_image(&pixmap))
}

// ============================================================================
// Pixmap conversion
// ============================================================================

/// Converts a straight-alpha image into a premultiplied tiny-skia pixmap.
///
/// Returns `None` for zero-sized images.
pub fn rgba_image_to_pixmap(img: &RgbaImage) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(img.width(), img.height())?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(img.pixels()) {
        let [r, g, b, a] = src.0;
        *dst = ColorU8::from_rgba(r, g, b, a).premultiply();
    }
    Some(pixmap)
}

/// Converts a tiny-skia Pixmap to an image::RgbaImage.
pub fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let width = pixmap.width();
    let height = pixmap.height();
    let mut img = RgbaImage::new(width, height);

    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        // tiny_skia uses premultiplied alpha, we need to unpremultiply
        let (r, g, b, a) = unpremultiply(src.red(), src.green(), src.blue(), src.alpha());
        *dst = Rgba([r, g, b, a]);
    }

    img
}

/// Unpremultiplies a premultiplied alpha pixel.
fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        (0, 0, 0, 0)
    } else {
        let a_f = a as f32 / 255.0;
        (
            (r as f32 / a_f).round().min(255.0) as u8,
            (g as f32 / a_f).round().min(255.0) as u8,
            (b as f32 / a_f).round().min(255.0) as u8,
            a,
        )
    }
}

// ============================================================================
// Compositing
// ============================================================================

/// Composites a source image onto a destination image at the specified position.
///
/// Uses standard alpha blending (source over destination). Fully transparent
/// source pixels leave the destination bit-for-bit unchanged.
pub fn composite_over(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;

    for (sx, sy, src_pixel) in src.enumerate_pixels() {
        if src_pixel[3] == 0 {
            continue;
        }

        let dx = x + sx as i32;
        let dy = y + sy as i32;

        // Skip if outside destination bounds
        if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height {
            continue;
        }

        let dst_pixel = dest.get_pixel(dx as u32, dy as u32);
        let blended = alpha_blend(*src_pixel, *dst_pixel);
        dest.put_pixel(dx as u32, dy as u32, blended);
    }
}

/// Alpha blends two RGBA pixels (source over destination).
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);

    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
