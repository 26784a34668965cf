//! Layer infrastructure for card composition.
//!
//! A card is the template canvas with a fixed sequence of layers painted on
//! top of it. Each layer is a self-contained description of what to draw;
//! [`LayerStack::render`] applies them in order to a [`RenderContext`].
//!
//! ```text
//! Template
//!     │
//!     ▼
//! ┌────────────────┐
//! │ Profile circle │ ◄── no-op without a profile picture
//! └───────┬────────┘
//!         │
//!         ▼
//! ┌────────────────┐
//! │   Text lines   │ ◄── skipped when name and handle are both empty
//! └───────┬────────┘
//!         │
//!         ▼
//!      Canvas
//! ```

pub mod circle;
pub mod raster;
pub mod text;

pub use circle::{ProfileCircleLayer, composite_profile};
pub use text::{PositionedLine, TextBlock, TextLayer, TextLayout, layout};

use image::RgbaImage;

use crate::font::FontRegistry;
use crate::geometry::{CircularMask, Template};

// ============================================================================
// Render Context
// ============================================================================

/// State that flows through the layer stack for one render.
pub struct RenderContext<'a> {
    /// The canvas being painted. Starts as a copy of the template.
    pub canvas: RgbaImage,

    /// Geometry of the template's circle.
    pub mask: CircularMask,

    /// Fonts available to text layers.
    pub fonts: &'a FontRegistry,
}

impl<'a> RenderContext<'a> {
    /// Starts a context from a template, taking ownership of its pixels.
    pub fn new(template: Template, fonts: &'a FontRegistry) -> Self {
        Self {
            canvas: template.image,
            mask: template.mask,
            fonts,
        }
    }

    /// Consumes the context and returns the painted canvas.
    pub fn into_canvas(self) -> RgbaImage {
        self.canvas
    }
}

// ============================================================================
// Layer Trait
// ============================================================================

/// A step that paints onto the canvas.
///
/// Layers cannot fail: every input they receive has already been decoded
/// and validated, so drawing is a pure transformation of the canvas.
pub trait CanvasLayer {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Paint this layer onto `ctx.canvas`.
    fn apply(&self, ctx: &mut RenderContext<'_>);
}

// ============================================================================
// Layer Stack
// ============================================================================

/// An ordered list of layers, bottom first.
#[derive(Default)]
pub struct LayerStack<'l> {
    layers: Vec<Box<dyn CanvasLayer + 'l>>,
}

impl<'l> LayerStack<'l> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Appends a layer on top of the existing ones.
    pub fn push(mut self, layer: impl CanvasLayer + 'l) -> Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Applies every layer in order and returns the finished canvas.
    pub fn render(&self, mut ctx: RenderContext<'_>) -> RgbaImage {
        log::debug!("rendering {} layers", self.layers.len());
        for layer in &self.layers {
            log::debug!("applying layer {}", layer.name());
            layer.apply(&mut ctx);
        }
        ctx.into_canvas()
    }
}
