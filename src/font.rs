//! Font registry and fallback resolution.
//!
//! Font files are registered once, under logical family names, into an
//! immutable [`FontRegistry`]. Each text role then walks an ordered chain of
//! [`FontSpec`]s and keeps the first one that actually produces glyphs for a
//! probe string. The registry is shared between renders behind an `Arc` and is
//! never mutated after [`FontRegistryBuilder::build`].

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use resvg::usvg::fontdb::{Database, Family, Language, Source};
use resvg::usvg::{Options, Tree};
use serde::{Deserialize, Serialize};

use crate::error::FontRegistrationError;
use crate::layer::raster::{TextRun, text_run_svg};

/// Reference string measured to verify that a font is usable.
pub const PROBE_TEXT: &str = "Test";

/// Family used when a fallback chain is empty.
pub const GENERIC_FALLBACK: &str = "sans-serif";

/// Installed families tried, in order, for generic names whose fontdb
/// default is missing.
const SANS_SERIF_FAMILIES: &[&str] = &[
    "Arial",
    "Helvetica",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
    "FreeSans",
    "Roboto",
];
const SERIF_FAMILIES: &[&str] = &[
    "Times New Roman",
    "Liberation Serif",
    "DejaVu Serif",
    "Noto Serif",
    "FreeSerif",
];
const MONOSPACE_FAMILIES: &[&str] = &[
    "Courier New",
    "Liberation Mono",
    "DejaVu Sans Mono",
    "Noto Sans Mono",
    "FreeMono",
];

// ============================================================================
// FontWeight / FontSpec
// ============================================================================

/// A numeric font weight (CSS scale, 100-900).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const NORMAL: Self = Self(400);
    pub const MEDIUM: Self = Self(500);
    pub const SEMIBOLD: Self = Self(600);
    pub const BOLD: Self = Self(700);
}

/// One candidate in a fallback chain: a family plus an optional weight token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSpec {
    pub family: String,

    /// Explicit weight. `None` leaves the face's own weight in charge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<FontWeight>,
}

impl FontSpec {
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: FontWeight) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Returns the `font-family` value for SVG markup.
    ///
    /// Generic families stay bare; named families are quoted.
    pub fn css_family(&self) -> String {
        if generic_family(&self.family).is_some() {
            self.family.clone()
        } else {
            format!("'{}'", self.family.replace('\'', ""))
        }
    }
}

impl fmt::Display for FontSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.weight {
            Some(weight) => write!(f, "{} {}", weight.0, self.family),
            None => f.write_str(&self.family),
        }
    }
}

fn generic_family(name: &str) -> Option<Family<'static>> {
    match name.to_ascii_lowercase().as_str() {
        "serif" => Some(Family::Serif),
        "sans-serif" => Some(Family::SansSerif),
        "cursive" => Some(Family::Cursive),
        "fantasy" => Some(Family::Fantasy),
        "monospace" => Some(Family::Monospace),
        _ => None,
    }
}

// ============================================================================
// Font assets
// ============================================================================

/// A font file name and the logical family it is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontAsset {
    pub file: String,
    pub family: String,
}

impl FontAsset {
    pub fn new(file: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            family: family.into(),
        }
    }
}

/// The Satoshi variants the stock card styles expect.
pub fn default_font_assets() -> Vec<FontAsset> {
    vec![
        FontAsset::new("Satoshi-Regular.ttf", "Satoshi"),
        FontAsset::new("Satoshi-Bold.ttf", "Satoshi-Bold"),
        FontAsset::new("Satoshi-Medium.ttf", "Satoshi-Medium"),
    ]
}

// ============================================================================
// FontRegistry
// ============================================================================

/// Process-wide, read-only set of usable fonts.
pub struct FontRegistry {
    db: Arc<Database>,

    /// Logical family names registered from font files.
    families: BTreeSet<String>,
}

impl fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontRegistry")
            .field("faces", &self.db.len())
            .field("families", &self.families)
            .finish()
    }
}

impl FontRegistry {
    pub fn builder() -> FontRegistryBuilder {
        FontRegistryBuilder::default()
    }

    /// A registry with no fonts at all. Every chain falls through to its last entry.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Shared handle to the underlying font database.
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    /// Logical families that were registered from font files.
    pub fn registered_families(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(String::as_str)
    }

    /// Returns true if any face answers to `family`.
    ///
    /// Generic names (`sans-serif`, ...) are mapped to the database's
    /// configured family first. Once any face is loaded every generic name
    /// is present.
    pub fn contains_family(&self, family: &str) -> bool {
        match generic_family(family) {
            Some(generic) => has_family(&self.db, self.db.family_name(&generic)),
            None => has_family(&self.db, family),
        }
    }

    /// Parses SVG markup, resolving `<text>` against this registry.
    pub(crate) fn parse_svg(&self, svg: &str) -> Result<Tree, resvg::usvg::Error> {
        let mut opts = Options::default();
        opts.fontdb = self.database();
        Tree::from_str(svg, &opts)
    }
}

/// Collects font files before freezing them into a [`FontRegistry`].
#[derive(Default)]
pub struct FontRegistryBuilder {
    db: Database,
    families: BTreeSet<String>,
}

impl FontRegistryBuilder {
    /// Loads the fonts installed on the host.
    pub fn system_fonts(mut self) -> Self {
        self.db.load_system_fonts();
        log::debug!("loaded system fonts, {} faces total", self.db.len());
        self
    }

    /// Registers every asset found in `dir`. Missing or broken files are
    /// logged and skipped.
    pub fn font_dir(mut self, dir: &Path, assets: &[FontAsset]) -> Self {
        let mut loaded = 0usize;
        for asset in assets {
            let path = dir.join(&asset.file);
            match self.register_file(&path, &asset.family) {
                Ok(faces) => {
                    log::info!(
                        "registered font {} ({faces} faces) from {}",
                        asset.family,
                        path.display()
                    );
                    loaded += 1;
                }
                Err(err) => log::warn!("{err}"),
            }
        }
        if loaded == 0 && !assets.is_empty() {
            log::info!(
                "no card fonts found in {}; place {} there to use them, system fallbacks apply meanwhile",
                dir.display(),
                assets
                    .iter()
                    .map(|a| a.file.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        self
    }

    /// Registers a single font file under a logical family name.
    pub fn register_file(&mut self, path: &Path, family: &str) -> Result<usize, FontRegistrationError> {
        let data = std::fs::read(path).map_err(|source| FontRegistrationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.register_data(data, family, path)
    }

    /// Registers in-memory font data under a logical family name.
    ///
    /// Every face keeps its own family names and additionally answers to
    /// `family`, so `Satoshi-Bold.ttf` is reachable both as `Satoshi @700`
    /// and as `Satoshi-Bold`.
    pub fn register_data(
        &mut self,
        data: Vec<u8>,
        family: &str,
        origin: &Path,
    ) -> Result<usize, FontRegistrationError> {
        let ids = self.db.load_font_source(Source::Binary(Arc::new(data)));
        if ids.is_empty() {
            return Err(FontRegistrationError::NoFaces {
                path: PathBuf::from(origin),
            });
        }

        let mut count = 0;
        for id in ids {
            if let Some(face) = self.db.face(id).cloned() {
                let mut alias = face;
                alias.families = vec![(family.to_string(), Language::English_UnitedStates)];
                self.db.push_face_info(alias);
                count += 1;
            }
        }
        self.families.insert(family.to_string());
        Ok(count)
    }

    /// Freezes the registry, pointing each generic family at an installed one.
    pub fn build(mut self) -> FontRegistry {
        bind_generic_families(&mut self.db);
        let registry = FontRegistry {
            db: Arc::new(self.db),
            families: self.families,
        };
        log::debug!(
            "font registry ready: {} faces, card families [{}]",
            registry.db.len(),
            registry.registered_families().collect::<Vec<_>>().join(", ")
        );
        registry
    }
}

fn has_family(db: &Database, family: &str) -> bool {
    db.faces()
        .any(|face| face.families.iter().any(|(name, _)| name == family))
}

fn first_installed(db: &Database, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find(|name| has_family(db, name))
        .map(|name| name.to_string())
}

/// fontdb ships fixed defaults (`Arial`, `Times New Roman`, ...) for the
/// generic families whether or not they are installed. Rebinds every generic
/// whose default is missing, so `sans-serif` always resolves when the
/// database holds at least one face.
fn bind_generic_families(db: &mut Database) {
    let Some(any_family) = db
        .faces()
        .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
    else {
        return;
    };
    let sans_serif = first_installed(db, SANS_SERIF_FAMILIES).unwrap_or(any_family);

    for generic in [
        Family::SansSerif,
        Family::Serif,
        Family::Monospace,
        Family::Cursive,
        Family::Fantasy,
    ] {
        if has_family(db, db.family_name(&generic)) {
            continue;
        }
        let target = match generic {
            Family::Serif => first_installed(db, SERIF_FAMILIES),
            Family::Monospace => first_installed(db, MONOSPACE_FAMILIES),
            _ => None,
        }
        .unwrap_or_else(|| sans_serif.clone());

        log::debug!("generic family {generic:?} maps to {target}");
        match generic {
            Family::Serif => db.set_serif_family(target),
            Family::SansSerif => db.set_sans_serif_family(target),
            Family::Monospace => db.set_monospace_family(target),
            Family::Cursive => db.set_cursive_family(target),
            Family::Fantasy => db.set_fantasy_family(target),
            Family::Name(_) => {}
        }
    }
}

// ============================================================================
// Measurement and resolution
// ============================================================================

/// Something that can tell how wide a string renders in a given font.
pub trait TextMeasure {
    /// Width of `text` in pixels; `0.0` when the font cannot render it.
    fn measure(&self, font: &FontSpec, size: f32, text: &str) -> f32;
}

impl TextMeasure for FontRegistry {
    /// Lays `text` out through usvg against this registry.
    ///
    /// Families the registry does not know measure as zero even though usvg
    /// would quietly substitute its default serif face for them.
    fn measure(&self, font: &FontSpec, size: f32, text: &str) -> f32 {
        if !self.contains_family(&font.family) {
            return 0.0;
        }

        let run = TextRun {
            text,
            font,
            size,
            fill: [0, 0, 0],
            x: 0.0,
            y: 0.0,
        };
        let width = (size * text.chars().count().max(1) as f32 * 2.0).ceil();
        let svg = text_run_svg(&run, width, size * 2.0);

        match self.parse_svg(&svg) {
            Ok(tree) if tree.root().has_children() => tree.root().bounding_box().width(),
            Ok(_) => 0.0,
            Err(err) => {
                log::debug!("probe layout failed for {font}: {err}");
                0.0
            }
        }
    }
}

/// Picks the first font in `chain` whose probe width is positive.
///
/// Total and deterministic: when nothing measures, the last candidate is
/// returned anyway (an empty chain yields [`GENERIC_FALLBACK`]).
pub fn resolve_font<M: TextMeasure + ?Sized>(chain: &[FontSpec], size: f32, measure: &M) -> FontSpec {
    for candidate in chain {
        let width = measure.measure(candidate, size, PROBE_TEXT);
        log::debug!("trying font {size}px {candidate}: probe width {width}");
        if width > 0.0 {
            log::debug!("using font {size}px {candidate}");
            return candidate.clone();
        }
    }

    match chain.last() {
        Some(last) => {
            log::warn!("no font in chain measured a non-zero width, keeping {last}");
            last.clone()
        }
        None => FontSpec::new(GENERIC_FALLBACK),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TextStyle;
    use std::cell::RefCell;

    /// Tuffy (public domain), the same face fontdb tests with.
    pub(crate) const TEST_FONT: &[u8] = include_bytes!("../testdata/fonts/Tuffy.ttf");

    /// A registry holding only the test face, registered under each of `families`.
    pub(crate) fn registry_with(families: &[&str]) -> FontRegistry {
        let mut builder = FontRegistry::builder();
        for family in families {
            builder
                .register_data(TEST_FONT.to_vec(), family, Path::new("Tuffy.ttf"))
                .unwrap();
        }
        builder.build()
    }

    /// Pretends a fixed set of families is installed.
    struct FakeSurface {
        installed: Vec<&'static str>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSurface {
        fn new(installed: &[&'static str]) -> Self {
            Self {
                installed: installed.to_vec(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextMeasure for FakeSurface {
        fn measure(&self, font: &FontSpec, size: f32, text: &str) -> f32 {
            self.calls.borrow_mut().push(font.to_string());
            if self.installed.contains(&font.family.as_str()) {
                size * text.len() as f32 * 0.5
            } else {
                0.0
            }
        }
    }

    fn title_chain() -> Vec<FontSpec> {
        vec![
            FontSpec::new("Satoshi-Bold"),
            FontSpec::new("Satoshi").with_weight(FontWeight::BOLD),
            FontSpec::new("Arial"),
        ]
    }

    #[test]
    fn first_measurable_candidate_wins() {
        let surface = FakeSurface::new(&["Satoshi", "Arial"]);
        let font = resolve_font(&title_chain(), 50.0, &surface);
        assert_eq!(font, FontSpec::new("Satoshi").with_weight(FontWeight::BOLD));
        // Stops as soon as a candidate passes.
        assert_eq!(surface.calls.borrow().len(), 2);
    }

    #[test]
    fn only_terminal_fallback_installed() {
        let surface = FakeSurface::new(&["Arial"]);
        for _ in 0..3 {
            assert_eq!(resolve_font(&title_chain(), 50.0, &surface), FontSpec::new("Arial"));
        }
    }

    #[test]
    fn nothing_measurable_returns_last() {
        let surface = FakeSurface::new(&[]);
        assert_eq!(resolve_font(&title_chain(), 50.0, &surface), FontSpec::new("Arial"));
        assert_eq!(surface.calls.borrow().len(), 3);
    }

    #[test]
    fn empty_chain_uses_generic_family() {
        let surface = FakeSurface::new(&[]);
        assert_eq!(resolve_font(&[], 40.0, &surface), FontSpec::new(GENERIC_FALLBACK));
    }

    #[test]
    fn empty_registry_measures_zero() {
        let registry = FontRegistry::empty();
        assert!(!registry.contains_family("Satoshi-Bold"));
        assert_eq!(registry.measure(&FontSpec::new("Satoshi-Bold"), 50.0, PROBE_TEXT), 0.0);
        assert_eq!(resolve_font(&title_chain(), 50.0, &registry), FontSpec::new("Arial"));
    }

    #[test]
    fn missing_font_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FontRegistry::builder()
            .font_dir(dir.path(), &default_font_assets())
            .build();
        assert_eq!(registry.registered_families().count(), 0);
    }

    #[test]
    fn garbage_font_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let mut builder = FontRegistry::builder();
        let err = builder.register_file(&path, "Broken").unwrap_err();
        assert!(matches!(err, FontRegistrationError::NoFaces { .. }));
        assert!(!builder.build().contains_family("Broken"));
    }

    #[test]
    fn font_spec_display_and_css() {
        let spec = FontSpec::new("Satoshi-Medium").with_weight(FontWeight::SEMIBOLD);
        assert_eq!(spec.to_string(), "600 Satoshi-Medium");
        assert_eq!(spec.css_family(), "'Satoshi-Medium'");
        assert_eq!(FontSpec::new("sans-serif").css_family(), "sans-serif");
    }

    #[test]
    fn registered_alias_is_measurable() {
        let registry = registry_with(&["Satoshi-Bold"]);
        assert_eq!(registry.registered_families().collect::<Vec<_>>(), vec!["Satoshi-Bold"]);
        assert!(registry.contains_family("Satoshi-Bold"));
        assert!(registry.contains_family("Tuffy"));
        assert!(registry.measure(&FontSpec::new("Satoshi-Bold"), 50.0, PROBE_TEXT) > 0.0);
        assert_eq!(
            resolve_font(&TextStyle::title().fallback, 50.0, &registry),
            FontSpec::new("Satoshi-Bold")
        );
    }

    #[test]
    fn generic_families_bind_to_installed_face() {
        let registry = registry_with(&["Tuffy"]);
        assert!(!registry.contains_family("Arial"));
        for generic in ["sans-serif", "serif", "monospace", "cursive", "fantasy"] {
            assert!(registry.contains_family(generic), "{generic} is unbound");
        }
        assert!(registry.measure(&FontSpec::new("sans-serif"), 40.0, PROBE_TEXT) > 0.0);
    }

    #[test]
    fn default_chains_end_in_an_installed_generic() {
        // Neither Satoshi nor Arial installed
        let registry = registry_with(&["Tuffy"]);
        for style in [TextStyle::title(), TextStyle::subtitle()] {
            let font = resolve_font(&style.fallback, style.font_size, &registry);
            assert_eq!(font, FontSpec::new(GENERIC_FALLBACK));
            assert!(registry.measure(&font, style.font_size, PROBE_TEXT) > 0.0);
        }
    }

    #[test]
    fn empty_registry_has_no_generics() {
        assert!(!FontRegistry::empty().contains_family("sans-serif"));
    }
}
