//! Two-line text label: layout geometry and drawing.
//!
//! The label sits to the right of the circle. Both lines share one left edge,
//! and the block (title, spacing, subtitle) is centered on the circle's
//! vertical center regardless of its radius.

use image::RgbaImage;

use super::raster::{TextRun, composite_over, rasterize_tree, text_run_svg};
use super::{CanvasLayer, RenderContext};
use crate::config::{CardProfile, Color, TextRole, TextStyle};
use crate::font::{FontRegistry, FontSpec, TextMeasure, resolve_font};
use crate::geometry::{CircularMask, PointF, RectPx};
use crate::text::{normalize_handle, normalize_name};

/// Height of the raster strip rendered per line, relative to the font size.
///
/// Leaves room for descenders below the em box.
const LINE_BOX_SCALE: f32 = 1.5;

// ============================================================================
// TextBlock
// ============================================================================

/// Raw text for one role, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBlock {
    pub role: TextRole,
    pub raw_text: String,
}

impl TextBlock {
    pub fn new(role: TextRole, raw_text: impl Into<String>) -> Self {
        Self {
            role,
            raw_text: raw_text.into(),
        }
    }

    pub fn title(raw_text: impl Into<String>) -> Self {
        Self::new(TextRole::Title, raw_text)
    }

    pub fn subtitle(raw_text: impl Into<String>) -> Self {
        Self::new(TextRole::Subtitle, raw_text)
    }

    /// The text as it will be drawn.
    ///
    /// Titles are emoji-stripped and truncated; subtitles are handles and
    /// only gain an `@` prefix.
    pub fn display_text(&self, max_name_length: usize) -> String {
        match self.role {
            TextRole::Title => normalize_name(&self.raw_text, max_name_length),
            TextRole::Subtitle => normalize_handle(&self.raw_text),
        }
    }
}

// ============================================================================
// Layout
// ============================================================================

/// A line of text with its resolved font and top-left anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedLine {
    pub text: String,
    pub origin: PointF,
    pub font: FontSpec,
    pub size: f32,
    pub fill: Color,
}

impl PositionedLine {
    fn resolve<M: TextMeasure + ?Sized>(
        text: String,
        origin: PointF,
        style: &TextStyle,
        measure: &M,
    ) -> Self {
        Self {
            text,
            origin,
            font: resolve_font(&style.fallback, style.font_size, measure),
            size: style.font_size,
            fill: style.fill,
        }
    }
}

/// Positions of the title and subtitle lines.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub title: PositionedLine,
    pub subtitle: PositionedLine,
}

impl TextLayout {
    /// Lines with something to draw, title first.
    pub fn lines(&self) -> impl Iterator<Item = &PositionedLine> {
        [&self.title, &self.subtitle]
            .into_iter()
            .filter(|line| !line.text.is_empty())
    }
}

/// Computes where the title and subtitle go and which font each uses.
///
/// Returns `None` when both raw texts are empty: nothing is laid out or drawn.
pub fn layout<M: TextMeasure + ?Sized>(
    mask: &CircularMask,
    profile: &CardProfile,
    title: &TextBlock,
    subtitle: &TextBlock,
    measure: &M,
) -> Option<TextLayout> {
    if title.raw_text.is_empty() && subtitle.raw_text.is_empty() {
        return None;
    }

    let title_style = profile.style(title.role);
    let subtitle_style = profile.style(subtitle.role);

    let text_start_x = mask.center.x + mask.radius + profile.horizontal_gap;
    let total_height = title_style.font_size + profile.line_spacing + subtitle_style.font_size;
    let block_top = mask.center.y - total_height / 2.0;

    let title_origin = PointF::new(text_start_x, block_top);
    let subtitle_origin = PointF::new(
        text_start_x,
        block_top + title_style.font_size + profile.line_spacing,
    );

    Some(TextLayout {
        title: PositionedLine::resolve(
            title.display_text(profile.max_name_length),
            title_origin,
            title_style,
            measure,
        ),
        subtitle: PositionedLine::resolve(
            subtitle.display_text(profile.max_name_length),
            subtitle_origin,
            subtitle_style,
            measure,
        ),
    })
}

// ============================================================================
// TextLayer
// ============================================================================

/// Lays out the name and handle against the context's mask and draws them.
///
/// Normalization, font resolution and layout run when the layer is applied,
/// after the layers below it.
#[derive(Debug, Clone)]
pub struct TextLayer<'p> {
    pub profile: &'p CardProfile,
    pub title: TextBlock,
    pub subtitle: TextBlock,
}

impl<'p> TextLayer<'p> {
    pub fn new(profile: &'p CardProfile, title: TextBlock, subtitle: TextBlock) -> Self {
        Self {
            profile,
            title,
            subtitle,
        }
    }
}

impl CanvasLayer for TextLayer<'_> {
    fn name(&self) -> &'static str {
        "text"
    }

    fn apply(&self, ctx: &mut RenderContext<'_>) {
        let Some(layout) = layout(&ctx.mask, self.profile, &self.title, &self.subtitle, ctx.fonts)
        else {
            log::debug!("name and handle are empty, skipping text");
            return;
        };
        for line in layout.lines() {
            draw_line(&mut ctx.canvas, ctx.fonts, line);
        }
    }
}

/// Rasterizes one line into a strip starting at its anchor and composites it.
fn draw_line(canvas: &mut RgbaImage, fonts: &FontRegistry, line: &PositionedLine) {
    let left = line.origin.x.floor().max(0.0);
    let top = line.origin.y.floor().max(0.0);
    let strip = RectPx::new(
        left as u32,
        top as u32,
        canvas.width().saturating_sub(left as u32),
        (line.size * LINE_BOX_SCALE).ceil() as u32,
    )
    .intersect(&RectPx::from_size(canvas.width(), canvas.height()));

    if strip.is_empty() {
        log::warn!(
            "text {:?} at ({}, {}) falls outside the canvas",
            line.text,
            line.origin.x,
            line.origin.y
        );
        return;
    }

    let run = TextRun {
        text: &line.text,
        font: &line.font,
        size: line.size,
        fill: line.fill.to_array(),
        x: line.origin.x - left,
        y: line.origin.y - top,
    };
    let svg = text_run_svg(&run, strip.width as f32, strip.height as f32);

    match fonts.parse_svg(&svg) {
        Ok(tree) => {
            if let Some(img) = rasterize_tree(&tree) {
                log::debug!(
                    "drawing {:?} at ({}, {}) with {}px {}",
                    line.text,
                    line.origin.x,
                    line.origin.y,
                    line.size,
                    line.font
                );
                composite_over(canvas, &img, strip.x as i32, strip.y as i32);
            }
        }
        Err(err) => log::warn!("cannot lay out text {:?}: {err}", line.text),
    }
}
