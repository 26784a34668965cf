//! Error types for card rendering.
//!
//! Only [`RenderError`] ever reaches the caller of
//! [`CardRenderer::render`](crate::CardRenderer::render). Profile and font
//! errors are recoverable: the pipeline logs them and keeps going.

use std::io;
use std::path::PathBuf;

/// Convenience result type for fatal render failures.
pub type RenderResult<T> = Result<T, RenderError>;

/// A failure that aborts a single render request.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// The template asset could not be read or decoded.
    #[error("failed to load template {path}: {source}")]
    TemplateLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The composited canvas could not be encoded as PNG.
    #[error("failed to encode output image: {0}")]
    Encode(#[source] image::ImageError),

    /// The encoded image could not be written to its destination.
    #[error("failed to write output {path}: {source}")]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure of the external image fetch collaborator.
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    /// The transport failed or the server answered with an error status.
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    /// Reading a local image source failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    /// Build a [`FetchError::Request`] value.
    pub fn request(url: impl Into<String>, message: impl ToString) -> Self {
        Self::Request {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Why a profile picture is missing from a render.
///
/// Never returned from the pipeline; the render degrades to the empty circle.
#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("profile fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("profile decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// A font file that could not be added to the registry.
#[derive(thiserror::Error, Debug)]
pub enum FontRegistrationError {
    #[error("cannot read font file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("font file {path} contains no usable faces")]
    NoFaces { path: PathBuf },
}

/// Invalid or unreadable configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid card profile JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid mask geometry: {0}")]
    InvalidMask(String),

    #[error("invalid color {0:?}, expected #RRGGBB")]
    InvalidColor(String),
}
