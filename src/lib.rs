//! welcome-card: Personalized welcome card renderer
//!
//! This crate composites a user's profile picture into the circle of a
//! template image and draws their display name and handle beside it, then
//! writes the result as a PNG.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use welcome_card::{CardRenderer, FontRegistry, RenderRequest, default_font_assets};
//!
//! let fonts = FontRegistry::builder()
//!     .system_fonts()
//!     .font_dir(Path::new("fonts"), &default_font_assets())
//!     .build();
//!
//! let renderer = CardRenderer::new("images/template/card.png", Arc::new(fonts));
//! let request = RenderRequest::new("Ada Lovelace 🚀", "ada", "output/welcome-ada.png");
//! renderer.render(&request)?;
//! # Ok::<(), welcome_card::RenderError>(())
//! ```
//!
//! # Serializable Profiles
//!
//! Template-specific geometry and text styles live in a [`CardProfile`],
//! which round-trips through JSON:
//!
//! ```
//! use welcome_card::CardProfile;
//!
//! let profile = CardProfile::from_json(r#"{"lineSpacing": 16}"#).unwrap();
//! assert_eq!(profile.mask.radius, 150.0);
//!
//! let json = profile.to_json().unwrap();
//! assert_eq!(CardProfile::from_json(&json).unwrap(), profile);
//! ```

mod config;
mod error;
mod fetch;
mod font;
mod geometry;
mod layer;
mod pipeline;
mod text;

pub use config::{CardProfile, Color, Settings, TextRole, TextStyle, default_output_path};
pub use error::{ConfigError, FetchError, FontRegistrationError, ProfileError, RenderError, RenderResult};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{FileFetcher, ImageFetcher, decode_profile};
pub use font::{
    FontAsset, FontRegistry, FontRegistryBuilder, FontSpec, FontWeight, TextMeasure,
    default_font_assets, resolve_font,
};
pub use geometry::{CircularMask, PointF, RectPx, Template};
pub use layer::{
    CanvasLayer, LayerStack, PositionedLine, ProfileCircleLayer, RenderContext, TextBlock,
    TextLayer, TextLayout, composite_profile, layout,
};
pub use pipeline::{CardRenderer, RenderRequest};
pub use text::{normalize_handle, normalize_name, strip_emoji, truncate_name};
