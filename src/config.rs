//! Card layout profile and runtime settings.
//!
//! A [`CardProfile`] captures everything tied to a particular template asset
//! (circle geometry, text styles, spacing) in a JSON-friendly format, so a new
//! template only needs a new profile file.
//!
//! # JSON Format
//!
//! ```json
//! {
//!   "mask": { "center": { "x": 715.0, "y": 598.0 }, "radius": 150.0, "borderWidth": 20.0 },
//!   "horizontalGap": 70.0,
//!   "lineSpacing": 20.0,
//!   "maxNameLength": 15,
//!   "title": {
//!     "fontSize": 50.0,
//!     "fill": "#3A3A3A",
//!     "fallback": [{ "family": "Satoshi-Bold" }, { "family": "sans-serif" }]
//!   }
//! }
//! ```
//!
//! Missing fields take the stock template's values.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use palette::Srgb;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::font::{FontSpec, FontWeight, GENERIC_FALLBACK};
use crate::geometry::CircularMask;
use crate::text::DEFAULT_MAX_NAME_LENGTH;

// ============================================================================
// Color
// ============================================================================

/// An opaque sRGB fill color, serialized as `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Color {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rgb: Srgb<u8> = s
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidColor(s.to_string()))?;
        Ok(Self::rgb(rgb.red, rgb.green, rgb.blue))
    }
}

impl TryFrom<String> for Color {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

// ============================================================================
// Text styles
// ============================================================================

/// Which of the two label lines a piece of text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextRole {
    /// The display name.
    Title,
    /// The handle, drawn under the name.
    Subtitle,
}

/// Size, color and font fallback chain for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    pub font_size: f32,
    pub fill: Color,

    /// Candidates tried in order; the last one should be a generic family,
    /// which resolves whenever any font is loaded.
    pub fallback: Vec<FontSpec>,
}

impl TextStyle {
    /// Bold dark-grey name line.
    pub fn title() -> Self {
        Self {
            font_size: 50.0,
            fill: Color::rgb(0x3A, 0x3A, 0x3A),
            fallback: vec![
                FontSpec::new("Satoshi-Bold"),
                FontSpec::new("Satoshi-Bold").with_weight(FontWeight::NORMAL),
                FontSpec::new("Satoshi").with_weight(FontWeight::BOLD),
                FontSpec::new("Arial"),
                FontSpec::new(GENERIC_FALLBACK),
            ],
        }
    }

    /// Light-grey handle line, medium face pushed to a heavier weight.
    pub fn subtitle() -> Self {
        Self {
            font_size: 40.0,
            fill: Color::rgb(0xBF, 0xBF, 0xBF),
            fallback: vec![
                FontSpec::new("Satoshi-Medium").with_weight(FontWeight::BOLD),
                FontSpec::new("Satoshi-Medium").with_weight(FontWeight::SEMIBOLD),
                FontSpec::new("Satoshi-Medium"),
                FontSpec::new("Satoshi").with_weight(FontWeight::BOLD),
                FontSpec::new("Arial"),
                FontSpec::new(GENERIC_FALLBACK),
            ],
        }
    }
}

// ============================================================================
// CardProfile
// ============================================================================

/// Layout constants for one template asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CardProfile {
    /// Where the template's circle is.
    pub mask: CircularMask,

    /// Distance between the circle's right edge and the text.
    pub horizontal_gap: f32,

    /// Vertical gap between the title and subtitle boxes.
    pub line_spacing: f32,

    /// Display names longer than this are cut and get an ellipsis.
    pub max_name_length: usize,

    pub title: TextStyle,
    pub subtitle: TextStyle,
}

impl Default for CardProfile {
    fn default() -> Self {
        Self {
            mask: CircularMask::default(),
            horizontal_gap: 70.0,
            line_spacing: 20.0,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            title: TextStyle::title(),
            subtitle: TextStyle::subtitle(),
        }
    }
}

impl CardProfile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the circle geometry.
    pub fn with_mask(mut self, mask: CircularMask) -> Self {
        self.mask = mask;
        self
    }

    /// Returns the style for a text role.
    pub fn style(&self, role: TextRole) -> &TextStyle {
        match role {
            TextRole::Title => &self.title,
            TextRole::Subtitle => &self.subtitle,
        }
    }

    /// Checks the mask invariants and that font sizes are positive.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.mask.validate()?;
        for (name, style) in [("title", &self.title), ("subtitle", &self.subtitle)] {
            if !(style.font_size.is_finite() && style.font_size > 0.0) {
                return Err(ConfigError::InvalidMask(format!(
                    "{name} font size must be positive, got {}",
                    style.font_size
                )));
            }
        }
        Ok(())
    }

    /// Serializes the profile to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serializes the profile to a pretty-printed JSON string.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes and validates a profile from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let profile: Self = serde_json::from_str(json)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Reads a profile from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }
}

// ============================================================================
// Settings
// ============================================================================

pub const TEMPLATE_PATH_VAR: &str = "TEMPLATE_IMAGE_PATH";
pub const OUTPUT_DIR_VAR: &str = "OUTPUT_DIRECTORY";
pub const FONT_DIR_VAR: &str = "FONT_DIRECTORY";
pub const PROFILE_PATH_VAR: &str = "CARD_PROFILE";

/// Where the renderer finds its assets and puts its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub template_path: PathBuf,
    pub output_dir: PathBuf,
    pub font_dir: PathBuf,

    /// Optional JSON [`CardProfile`]; the stock profile is used without one.
    pub profile_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("./images/template/Laika OG List.png"),
            output_dir: PathBuf::from("./output"),
            font_dir: PathBuf::from("./fonts"),
            profile_path: None,
        }
    }
}

impl Settings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for unset
    /// or empty variables.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);
        let defaults = Self::default();
        Self {
            template_path: get(TEMPLATE_PATH_VAR).unwrap_or(defaults.template_path),
            output_dir: get(OUTPUT_DIR_VAR).unwrap_or(defaults.output_dir),
            font_dir: get(FONT_DIR_VAR).unwrap_or(defaults.font_dir),
            profile_path: get(PROFILE_PATH_VAR),
        }
    }

    /// Loads the configured card profile, or the stock one.
    pub fn card_profile(&self) -> Result<CardProfile, ConfigError> {
        match &self.profile_path {
            Some(path) => CardProfile::load(path),
            None => Ok(CardProfile::default()),
        }
    }
}

/// Output file for a handle: `<output_dir>/welcome-<handle>.png`.
///
/// The leading `@` is dropped and characters that are unsafe in file names
/// become `_`.
pub fn default_output_path(output_dir: &Path, handle: &str) -> PathBuf {
    let stem: String = handle
        .trim_start_matches('@')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    let stem = if stem.is_empty() { "card".to_string() } else { stem };
    output_dir.join(format!("welcome-{stem}.png"))
}
