//! Circular profile picture layer.

use image::RgbaImage;
use resvg::tiny_skia::{FillRule, FilterQuality, Paint, PathBuilder, Pattern, Pixmap, SpreadMode, Transform};

use super::raster::{composite_over, pixmap_to_rgba_image, rgba_image_to_pixmap};
use super::{CanvasLayer, RenderContext};
use crate::geometry::CircularMask;

// ============================================================================
// ProfileCircleLayer
// ============================================================================

/// Paints the profile picture into the template's circle.
///
/// Without a picture the layer does nothing and the template's circle stays
/// as drawn.
#[derive(Debug, Clone, Default)]
pub struct ProfileCircleLayer {
    pub image: Option<RgbaImage>,
}

impl ProfileCircleLayer {
    pub fn new(image: Option<RgbaImage>) -> Self {
        Self { image }
    }
}

impl CanvasLayer for ProfileCircleLayer {
    fn name(&self) -> &'static str {
        "profile-circle"
    }

    fn apply(&self, ctx: &mut RenderContext<'_>) {
        composite_profile(&mut ctx.canvas, self.image.as_ref(), &ctx.mask);
    }
}

// ============================================================================
// Compositing
// ============================================================================

/// Stretches `profile` to the mask's picture diameter and paints it, clipped
/// to a circle, onto `canvas`.
///
/// Mutates `canvas` in place. Only pixels touched by the circle of radius
/// `mask.clip_radius()` around `mask.center` change (edge pixels are
/// anti-aliased); the ring between that circle and `mask.radius` keeps the
/// template's pixels.
pub fn composite_profile(canvas: &mut RgbaImage, profile: Option<&RgbaImage>, mask: &CircularMask) {
    let Some(profile) = profile else {
        log::debug!("no profile picture, leaving the circle empty");
        return;
    };

    match clip_to_circle(profile, mask) {
        Some((overlay, x, y)) => composite_over(canvas, &overlay, x, y),
        None => log::warn!(
            "cannot clip a {}x{} profile picture into the circle, skipping it",
            profile.width(),
            profile.height()
        ),
    }
}

/// Renders the clipped picture into its own pixel-aligned overlay.
///
/// Returns the overlay and its top-left position on the canvas.
fn clip_to_circle(profile: &RgbaImage, mask: &CircularMask) -> Option<(RgbaImage, i32, i32)> {
    let diameter = mask.profile_diameter();
    let clip_radius = mask.clip_radius();
    let origin = mask.profile_origin();

    // Pixel-aligned box around the clip circle
    let left = (mask.center.x - clip_radius).floor();
    let top = (mask.center.y - clip_radius).floor();
    let width = ((mask.center.x + clip_radius).ceil() - left) as u32;
    let height = ((mask.center.y + clip_radius).ceil() - top) as u32;

    let source = rgba_image_to_pixmap(profile)?;
    let mut overlay = Pixmap::new(width, height)?;

    // Stretch, not letterbox: each axis is scaled independently
    let scale_x = diameter / source.width() as f32;
    let scale_y = diameter / source.height() as f32;
    let placement =
        Transform::from_scale(scale_x, scale_y).post_translate(origin.x - left, origin.y - top);

    let paint = Paint {
        shader: Pattern::new(
            source.as_ref(),
            SpreadMode::Pad,
            FilterQuality::Bicubic,
            1.0,
            placement,
        ),
        anti_alias: true,
        ..Paint::default()
    };

    let circle = PathBuilder::from_circle(mask.center.x - left, mask.center.y - top, clip_radius)?;
    overlay.fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);

    Some((pixmap_to_rgba_image(&overlay), left as i32, top as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PointF;
    use image::Rgba;

    const GREY: Rgba<u8> = Rgba([128, 128, 128, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn mask() -> CircularMask {
        CircularMask::new(PointF::new(150.0, 120.0), 100.0, 20.0).unwrap()
    }

    fn pixel_center_distance(x: u32, y: u32, mask: &CircularMask) -> f32 {
        (x as f32 + 0.5 - mask.center.x).hypot(y as f32 + 0.5 - mask.center.y)
    }

    #[test]
    fn absent_profile_is_a_no_op() {
        let mut canvas = RgbaImage::from_pixel(300, 240, GREY);
        composite_profile(&mut canvas, None, &mask());
        assert_eq!(canvas, RgbaImage::from_pixel(300, 240, GREY));
    }

    #[test]
    fn profile_fills_circle_and_keeps_border() {
        let mask = mask();
        let mut canvas = RgbaImage::from_pixel(300, 240, GREY);
        let profile = RgbaImage::from_pixel(64, 48, RED);

        composite_profile(&mut canvas, Some(&profile), &mask);

        // Center is the picture
        let center = canvas.get_pixel(150, 120);
        assert!(center[0] > 250 && center[1] < 5, "center was {:?}", center.0);

        // Just inside the clip radius (90) is still picture
        let inside = canvas.get_pixel(150 + 87, 120);
        assert!(inside[0] > 250 && inside[1] < 5, "inside was {:?}", inside.0);

        // The border ring (radius 90..100) shows the template
        assert_eq!(*canvas.get_pixel(150 + 95, 120), GREY);
        assert_eq!(*canvas.get_pixel(150, 120 - 95), GREY);
    }

    #[test]
    fn nothing_is_drawn_outside_the_clip_circle() {
        let mask = mask();
        let mut canvas = RgbaImage::from_pixel(300, 240, GREY);
        let profile = RgbaImage::from_fn(37, 53, |x, y| Rgba([x as u8 * 5, y as u8 * 4, 200, 255]));

        composite_profile(&mut canvas, Some(&profile), &mask);

        let limit = mask.clip_radius() + 1.0;
        for (x, y, pixel) in canvas.enumerate_pixels() {
            if pixel_center_distance(x, y, &mask) > limit {
                assert_eq!(*pixel, GREY, "pixel ({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn circle_near_canvas_edge_is_clipped() {
        let mask = CircularMask::new(PointF::new(10.0, 10.0), 30.0, 4.0).unwrap();
        let mut canvas = RgbaImage::from_pixel(50, 50, GREY);
        composite_profile(&mut canvas, Some(&RgbaImage::from_pixel(8, 8, RED)), &mask);
        let corner = canvas.get_pixel(0, 0);
        assert!(corner[0] > 250 && corner[1] < 5);
    }

    #[test]
    fn layer_uses_context_mask() {
        use crate::font::FontRegistry;
        use crate::geometry::Template;

        let fonts = FontRegistry::empty();
        let template = Template::new(RgbaImage::from_pixel(300, 240, GREY), mask());
        let mut ctx = RenderContext::new(template, &fonts);
        ProfileCircleLayer::new(Some(RgbaImage::from_pixel(10, 10, RED))).apply(&mut ctx);

        let center = ctx.canvas.get_pixel(150, 120);
        assert!(center[0] > 250);
        assert_eq!(*ctx.canvas.get_pixel(5, 5), GREY);
    }
}
