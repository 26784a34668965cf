//! Card rendering engine.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::config::CardProfile;
use crate::error::{RenderError, RenderResult};
use crate::fetch::{ImageFetcher, load_profile};
use crate::font::FontRegistry;
use crate::geometry::Template;
use crate::layer::{LayerStack, ProfileCircleLayer, RenderContext, TextBlock, TextLayer};

// ============================================================================
// RenderRequest
// ============================================================================

/// Everything that varies between two cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    pub display_name: String,
    pub handle: String,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    pub output_path: PathBuf,
}

impl RenderRequest {
    pub fn new(
        display_name: impl Into<String>,
        handle: impl Into<String>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            handle: handle.into(),
            profile_image_url: None,
            output_path: output_path.into(),
        }
    }

    pub fn with_profile_image_url(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }
}

// ============================================================================
// CardRenderer
// ============================================================================

/// Turns [`RenderRequest`]s into PNG files.
///
/// One renderer can serve any number of requests, from any number of threads:
/// it only reads its template path, profile and font registry.
///
/// # Stages
///
/// 1. **Load template** - fatal on failure
/// 2. **Fetch profile picture** - optional, failures are logged and skipped
/// 3. **Profile circle** - picture clipped into the template's circle
/// 4. **Text** - name and handle, normalized and laid out next to the circle
/// 5. **Encode** - flattened to RGB and PNG-encoded in memory
/// 6. **Write** - atomically replaces `output_path`
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use welcome_card::{CardRenderer, FontRegistry, RenderRequest};
///
/// let fonts = Arc::new(FontRegistry::builder().system_fonts().build());
/// let renderer = CardRenderer::new("template.png", fonts);
///
/// let request = RenderRequest::new("Ada Lovelace", "ada", "output/welcome-ada.png");
/// let path = renderer.render(&request)?;
/// # Ok::<(), welcome_card::RenderError>(())
/// ```
pub struct CardRenderer {
    template_path: PathBuf,
    profile: CardProfile,
    fonts: Arc<FontRegistry>,
    fetcher: Option<Box<dyn ImageFetcher>>,
}

impl CardRenderer {
    /// Creates a renderer with the stock profile and no image fetcher.
    pub fn new(template_path: impl Into<PathBuf>, fonts: Arc<FontRegistry>) -> Self {
        Self {
            template_path: template_path.into(),
            profile: CardProfile::default(),
            fonts,
            fetcher: None,
        }
    }

    pub fn with_profile(mut self, profile: CardProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Sets where profile picture bytes come from.
    pub fn with_fetcher(mut self, fetcher: impl ImageFetcher + 'static) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn profile(&self) -> &CardProfile {
        &self.profile
    }

    pub fn fonts(&self) -> &Arc<FontRegistry> {
        &self.fonts
    }

    /// Renders a card and writes it to `request.output_path`.
    ///
    /// Returns the path that was written.
    pub fn render(&self, request: &RenderRequest) -> RenderResult<PathBuf> {
        log::info!(
            "rendering card for {:?} ({})",
            request.display_name,
            request.handle
        );

        let template = self.load_template()?;
        let profile_image = self.fetch_profile(request.profile_image_url.as_deref());
        let canvas = self.compose(template, request, profile_image);

        let bytes = encode_png(canvas)?;
        write_atomic(&request.output_path, &bytes)?;

        log::info!("wrote {} ({} bytes)", request.output_path.display(), bytes.len());
        Ok(request.output_path.clone())
    }

    /// Composes the card in memory using an already decoded profile picture.
    ///
    /// Does not fetch or write anything; `request.output_path` and
    /// `request.profile_image_url` are ignored.
    pub fn render_image(
        &self,
        request: &RenderRequest,
        profile_image: Option<RgbaImage>,
    ) -> RenderResult<RgbaImage> {
        let template = self.load_template()?;
        Ok(self.compose(template, request, profile_image))
    }

    fn load_template(&self) -> RenderResult<Template> {
        let template = Template::load(&self.template_path, self.profile.mask)?;
        log::debug!(
            "loaded template {} ({}x{})",
            self.template_path.display(),
            template.image.width(),
            template.image.height()
        );
        Ok(template)
    }

    fn fetch_profile(&self, url: Option<&str>) -> Option<RgbaImage> {
        let url = url.filter(|u| !u.trim().is_empty())?;
        let Some(fetcher) = &self.fetcher else {
            log::warn!("no image fetcher configured, ignoring profile picture {url}");
            return None;
        };

        match load_profile(fetcher.as_ref(), url) {
            Ok(image) => {
                log::debug!("profile picture {}x{}", image.width(), image.height());
                Some(image)
            }
            Err(err) => {
                log::warn!("continuing without profile picture: {err}");
                None
            }
        }
    }

    fn compose(
        &self,
        template: Template,
        request: &RenderRequest,
        profile_image: Option<RgbaImage>,
    ) -> RgbaImage {
        LayerStack::new()
            .push(ProfileCircleLayer::new(profile_image))
            .push(TextLayer::new(
                &self.profile,
                TextBlock::title(request.display_name.as_str()),
                TextBlock::subtitle(request.handle.as_str()),
            ))
            .render(RenderContext::new(template, &self.fonts))
    }
}

// ============================================================================
// Output
// ============================================================================

/// Mode given to written cards: readable by other users and services.
#[cfg(unix)]
const OUTPUT_MODE: u32 = 0o644;

/// Flattens the canvas to RGB and encodes it as PNG.
fn encode_png(canvas: RgbaImage) -> RenderResult<Vec<u8>> {
    let rgb = DynamicImage::ImageRgba8(canvas).into_rgb8();
    let mut bytes = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(RenderError::Encode)?;
    Ok(bytes)
}

/// Writes `bytes` to a temporary file next to `path`, then renames it over
/// `path`. Readers never observe a partially written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> RenderResult<()> {
    let output_err = |source| RenderError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(output_err)?;
    file.write_all(bytes).map_err(output_err)?;
    file.flush().map_err(output_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.as_file()
            .set_permissions(std::fs::Permissions::from_mode(OUTPUT_MODE))
            .map_err(output_err)?;
    }
    file.persist(path).map_err(|err| output_err(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::tests::png_bytes;
    use image::Rgba;

    const BACKGROUND: Rgba<u8> = Rgba([240, 240, 235, 255]);
    const BLUE: Rgba<u8> = Rgba([20, 40, 220, 255]);

    struct StaticFetcher(Vec<u8>);

    impl ImageFetcher for StaticFetcher {
        fn fetch_image(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    impl ImageFetcher for FailingFetcher {
        fn fetch_image(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::request(url, "connection refused"))
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        template_path: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let template_path = dir.path().join("template.png");
            RgbaImage::from_pixel(1400, 800, BACKGROUND)
                .save(&template_path)
                .unwrap();
            Self { dir, template_path }
        }

        fn renderer(&self) -> CardRenderer {
            CardRenderer::new(&self.template_path, Arc::new(FontRegistry::empty()))
        }

        fn output(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    fn request(output: PathBuf) -> RenderRequest {
        RenderRequest::new("Ada Lovelace", "ada", output)
            .with_profile_image_url("https://example.test/ada.png")
    }

    #[test]
    fn renderer_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CardRenderer>();
    }

    #[test]
    fn render_writes_card_with_profile() {
        let fixture = Fixture::new();
        let renderer = fixture
            .renderer()
            .with_fetcher(StaticFetcher(png_bytes(50, 80, BLUE)));

        let out = fixture.output("card.png");
        let written = renderer.render(&request(out.clone())).unwrap();
        assert_eq!(written, out);

        let card = image::open(&out).unwrap();
        assert_eq!(card.color(), image::ColorType::Rgb8);
        let card = card.to_rgba8();
        assert_eq!(card.dimensions(), (1400, 800));

        // Picture fills the circle
        let center = card.get_pixel(715, 598);
        for (got, want) in center.0.iter().zip(BLUE.0) {
            assert!(got.abs_diff(want) <= 2, "center was {:?}", center.0);
        }
        // Ring between the clip radius (140) and the mask radius (150)
        assert_eq!(*card.get_pixel(715 + 145, 598), BACKGROUND);
        // Far corner is untouched
        assert_eq!(*card.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn missing_profile_leaves_circle_empty() {
        let fixture = Fixture::new();
        let renderer = fixture.renderer();

        let card = renderer
            .render_image(&RenderRequest::new("Ada", "ada", "unused.png"), None)
            .unwrap();
        assert_eq!(card, RgbaImage::from_pixel(1400, 800, BACKGROUND));
    }

    #[test]
    fn failed_fetch_still_renders() {
        let fixture = Fixture::new();
        let out = fixture.output("failed-fetch.png");
        fixture
            .renderer()
            .with_fetcher(FailingFetcher)
            .render(&request(out.clone()))
            .unwrap();
        assert_eq!(*image::open(&out).unwrap().to_rgba8().get_pixel(715, 598), BACKGROUND);
    }

    #[test]
    fn undecodable_profile_still_renders() {
        let fixture = Fixture::new();
        let out = fixture.output("garbage.png");
        fixture
            .renderer()
            .with_fetcher(StaticFetcher(b"<html>not found</html>".to_vec()))
            .render(&request(out.clone()))
            .unwrap();
        assert_eq!(*image::open(&out).unwrap().to_rgba8().get_pixel(715, 598), BACKGROUND);
    }

    #[test]
    fn url_without_fetcher_is_ignored() {
        let fixture = Fixture::new();
        let out = fixture.output("no-fetcher.png");
        fixture.renderer().render(&request(out.clone())).unwrap();
        assert!(out.exists());
    }

    #[test]
    fn missing_template_is_fatal() {
        let fixture = Fixture::new();
        let renderer = CardRenderer::new(fixture.output("nope.png"), Arc::new(FontRegistry::empty()));
        let out = fixture.output("card.png");

        let err = renderer.render(&request(out.clone())).unwrap_err();
        assert!(matches!(err, RenderError::TemplateLoad { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn unwritable_output_is_fatal() {
        let fixture = Fixture::new();
        let out = fixture.output("missing-dir").join("card.png");

        let err = fixture.renderer().render(&request(out)).unwrap_err();
        assert!(matches!(err, RenderError::OutputWrite { .. }));
    }

    #[test]
    fn rendering_is_deterministic() {
        let fixture = Fixture::new();
        let renderer = fixture
            .renderer()
            .with_fetcher(StaticFetcher(png_bytes(7, 3, BLUE)));

        let a = fixture.output("a.png");
        let b = fixture.output("b.png");
        renderer.render(&request(a.clone())).unwrap();
        renderer.render(&request(b.clone())).unwrap();

        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn render_replaces_existing_output() {
        let fixture = Fixture::new();
        let out = fixture.output("card.png");
        std::fs::write(&out, b"stale").unwrap();

        fixture.renderer().render(&request(out.clone())).unwrap();
        let card = image::open(&out).unwrap();
        assert_eq!((card.width(), card.height()), (1400, 800));
    }

    #[test]
    fn request_json_uses_camel_case() {
        let json = serde_json::to_string(&request(PathBuf::from("out.png"))).unwrap();
        assert!(json.contains("\"displayName\""));
        assert!(json.contains("\"profileImageUrl\""));

        let parsed: RenderRequest =
            serde_json::from_str(r#"{"displayName":"A","handle":"a","outputPath":"a.png"}"#).unwrap();
        assert_eq!(parsed.profile_image_url, None);
    }

    #[cfg(unix)]
    #[test]
    fn written_card_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = Fixture::new();
        let out = fixture.output("card.png");
        fixture.renderer().render(&request(out.clone())).unwrap();

        let mode = std::fs::metadata(&out).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn card_text_starts_right_of_circle() {
        use crate::font::tests::registry_with;

        let fixture = Fixture::new();
        let fonts = Arc::new(registry_with(&["Satoshi-Bold", "Satoshi-Medium"]));
        let renderer = CardRenderer::new(&fixture.template_path, fonts)
            .with_fetcher(StaticFetcher(png_bytes(20, 20, BLUE)));

        let out = fixture.output("elon.png");
        let req = RenderRequest::new("Elon Musk", "elonmusk", out.clone())
            .with_profile_image_url("https://example.test/elon.png");
        renderer.render(&req).unwrap();

        let card = image::open(&out).unwrap().to_rgba8();
        let ink: Vec<(u32, u32)> = card
            .enumerate_pixels()
            .filter(|(x, _, p)| *x > 715 + 150 && **p != BACKGROUND)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!ink.is_empty(), "no text drawn");
        assert!(ink.iter().all(|&(x, y)| x >= 935 && y >= 543));
        assert!(ink.iter().any(|&(_, y)| y < 600), "title missing");
        assert!(ink.iter().any(|&(_, y)| y >= 613), "subtitle missing");
    }
}
