//! Profile picture sources.
//!
//! The renderer never talks to the network itself. It asks an
//! [`ImageFetcher`] for raw bytes and decodes them with [`decode_profile`].

use std::path::PathBuf;

use image::RgbaImage;

use crate::error::{FetchError, ProfileError};

/// Supplies raw image bytes for a profile picture URL.
pub trait ImageFetcher: Send + Sync {
    fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Decodes fetched bytes into an RGBA image. The format is sniffed from the
/// data.
pub fn decode_profile(bytes: &[u8]) -> Result<RgbaImage, ProfileError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Fetches and decodes in one step.
pub fn load_profile(fetcher: &dyn ImageFetcher, url: &str) -> Result<RgbaImage, ProfileError> {
    let bytes = fetcher.fetch_image(url)?;
    log::debug!("fetched {} bytes from {url}", bytes.len());
    decode_profile(&bytes)
}

// ============================================================================
// FileFetcher
// ============================================================================

/// Serves every request from one local file, ignoring the URL.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageFetcher for FileFetcher {
    fn fetch_image(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Ok(std::fs::read(&self.path)?)
    }
}

// ============================================================================
// HttpFetcher
// ============================================================================

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use super::ImageFetcher;
    use crate::error::FetchError;

    /// Upper bound on a downloaded picture.
    const MAX_BODY_BYTES: u64 = 16 * 1024 * 1024;

    /// Blocking HTTP(S) fetcher with a whole-request timeout.
    #[derive(Clone)]
    pub struct HttpFetcher {
        agent: ureq::Agent,
    }

    impl HttpFetcher {
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

        pub fn new(timeout: Duration) -> Self {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();
            Self { agent }
        }
    }

    impl Default for HttpFetcher {
        fn default() -> Self {
            Self::new(Self::DEFAULT_TIMEOUT)
        }
    }

    impl ImageFetcher for HttpFetcher {
        fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            let mut response = self
                .agent
                .get(url)
                .call()
                .map_err(|err| FetchError::request(url, err))?;

            response
                .body_mut()
                .with_config()
                .limit(MAX_BODY_BYTES)
                .read_to_vec()
                .map_err(|err| FetchError::request(url, err))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    /// Encodes a solid image as PNG bytes.
    pub(crate) fn png_bytes(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(width, height, color)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    struct Failing;

    impl ImageFetcher for Failing {
        fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::request(url, "status code 404"))
        }
    }

    #[test]
    fn decodes_png() {
        let img = decode_profile(&png_bytes(3, 2, Rgba([1, 2, 3, 255]))).unwrap();
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [1, 2, 3, 255]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(decode_profile(b"not an image"), Err(ProfileError::Decode(_))));
    }

    #[test]
    fn fetch_failure_is_reported() {
        let err = load_profile(&Failing, "https://example.test/a.png").unwrap_err();
        assert!(matches!(err, ProfileError::Fetch(_)));
    }

    #[test]
    fn file_fetcher_reads_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.png");
        std::fs::write(&path, png_bytes(4, 4, Rgba([9, 9, 9, 255]))).unwrap();

        let img = load_profile(&FileFetcher::new(&path), "ignored").unwrap();
        assert_eq!(img.dimensions(), (4, 4));

        let missing = FileFetcher::new(dir.path().join("nope.png"));
        assert!(matches!(missing.fetch_image("x"), Err(FetchError::Io(_))));
    }
}
