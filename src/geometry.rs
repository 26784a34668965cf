//! Geometry and template types.
//!
//! The template is a fixed background raster with a pre-drawn circle. The
//! circle's position is a property of the asset, so it travels with the
//! template as a [`CircularMask`] rather than being detected from pixels.

use std::path::Path;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, RenderError};

/// A point in canvas coordinates (pixels, y pointing down).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A rectangle defined in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    /// X offset from the left edge of the canvas
    pub x: u32,
    /// Y offset from the top edge of the canvas
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Creates a rectangle starting at origin (0, 0) with the given dimensions.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    /// Returns the right edge coordinate (x + width).
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Returns the bottom edge coordinate (y + height).
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Returns the part of this rectangle that lies inside `bounds`.
    pub fn intersect(&self, bounds: &RectPx) -> RectPx {
        let x = self.x.max(bounds.x);
        let y = self.y.max(bounds.y);
        let right = self.right().min(bounds.right());
        let bottom = self.bottom().min(bounds.bottom());
        RectPx::new(x, y, right.saturating_sub(x), bottom.saturating_sub(y))
    }
}

/// The circular region of the template that receives the profile picture.
///
/// `border_width` is the part of the drawn circle that stays visible around
/// the picture: the picture diameter is `2 * radius - border_width`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularMask {
    pub center: PointF,
    pub radius: f32,
    pub border_width: f32,
}

impl CircularMask {
    /// Creates a mask, rejecting geometry that would hide the border ring.
    pub fn new(center: PointF, radius: f32, border_width: f32) -> Result<Self, ConfigError> {
        let mask = Self {
            center,
            radius,
            border_width,
        };
        mask.validate()?;
        Ok(mask)
    }

    /// Checks `radius > 0` and `0 <= border_width < 2 * radius`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ConfigError::InvalidMask(format!(
                "radius must be positive, got {}",
                self.radius
            )));
        }
        if !(self.border_width.is_finite()
            && self.border_width >= 0.0
            && self.border_width < 2.0 * self.radius)
        {
            return Err(ConfigError::InvalidMask(format!(
                "border width {} must be in [0, {})",
                self.border_width,
                2.0 * self.radius
            )));
        }
        if !(self.center.x.is_finite() && self.center.y.is_finite()) {
            return Err(ConfigError::InvalidMask("center must be finite".into()));
        }
        Ok(())
    }

    /// Diameter of the cropped profile picture.
    pub fn profile_diameter(&self) -> f32 {
        2.0 * self.radius - self.border_width
    }

    /// Radius of the circular clip applied to the profile picture.
    pub fn clip_radius(&self) -> f32 {
        self.profile_diameter() / 2.0
    }

    /// Top-left corner of the `diameter x diameter` box the picture is scaled into.
    pub fn profile_origin(&self) -> PointF {
        let half = self.clip_radius();
        PointF::new(self.center.x - half, self.center.y - half)
    }
}

impl Default for CircularMask {
    /// Geometry of the stock welcome template.
    fn default() -> Self {
        Self {
            center: PointF::new(715.0, 598.0),
            radius: 150.0,
            border_width: 20.0,
        }
    }
}

/// A decoded template together with the geometry of its circle.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    /// Background pixels in RGBA format.
    pub image: RgbaImage,

    pub mask: CircularMask,
}

impl Template {
    pub fn new(image: RgbaImage, mask: CircularMask) -> Self {
        Self { image, mask }
    }

    /// Reads and decodes a template from disk.
    pub fn load(path: &Path, mask: CircularMask) -> Result<Self, RenderError> {
        let image = image::open(path)
            .map_err(|source| RenderError::TemplateLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_rgba8();
        Ok(Self::new(image, mask))
    }
}
