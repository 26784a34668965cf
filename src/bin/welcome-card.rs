use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use welcome_card::{
    CardRenderer, FileFetcher, FontRegistry, HttpFetcher, RenderRequest, Settings,
    default_font_assets, default_output_path,
};

/// Render a welcome card for one user.
///
/// Paths not given on the command line come from TEMPLATE_IMAGE_PATH,
/// OUTPUT_DIRECTORY, FONT_DIRECTORY and CARD_PROFILE.
#[derive(Parser, Debug)]
#[command(name = "welcome-card", version)]
struct Cli {
    /// Display name drawn as the title.
    #[arg(long)]
    name: String,

    /// Handle drawn under the name; `@` is added when missing.
    #[arg(long)]
    handle: String,

    /// Profile picture URL.
    #[arg(long, conflicts_with = "avatar_file")]
    avatar_url: Option<String>,

    /// Profile picture read from disk.
    #[arg(long)]
    avatar_file: Option<PathBuf>,

    /// Output PNG path. Defaults to `<output dir>/welcome-<handle>.png`.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Template image.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Directory holding the Satoshi font files.
    #[arg(long)]
    fonts: Option<PathBuf>,

    /// Card profile JSON with the template's geometry and text styles.
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Use only the fonts in the font directory, not the ones installed on
    /// this machine.
    #[arg(long)]
    no_system_fonts: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(template) = cli.template {
        settings.template_path = template;
    }
    if let Some(fonts) = cli.fonts {
        settings.font_dir = fonts;
    }
    if cli.profile.is_some() {
        settings.profile_path = cli.profile;
    }

    let profile = match settings.card_profile() {
        Ok(profile) => profile,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let output = match cli.output {
        Some(path) => path,
        None => {
            if let Err(err) = std::fs::create_dir_all(&settings.output_dir) {
                eprintln!("error: cannot create {}: {err}", settings.output_dir.display());
                return ExitCode::FAILURE;
            }
            default_output_path(&settings.output_dir, &cli.handle)
        }
    };

    let mut fonts = FontRegistry::builder();
    if !cli.no_system_fonts {
        fonts = fonts.system_fonts();
    }
    let fonts = fonts.font_dir(&settings.font_dir, &default_font_assets()).build();

    let mut request = RenderRequest::new(cli.name, cli.handle, output);
    let renderer = CardRenderer::new(&settings.template_path, Arc::new(fonts)).with_profile(profile);
    let renderer = match (cli.avatar_file, cli.avatar_url) {
        (Some(path), _) => {
            request.profile_image_url = Some(path.display().to_string());
            renderer.with_fetcher(FileFetcher::new(path))
        }
        (None, Some(url)) => {
            request.profile_image_url = Some(url);
            renderer.with_fetcher(HttpFetcher::default())
        }
        (None, None) => renderer,
    };

    match renderer.render(&request) {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_fonts_load_unless_disabled() {
        let cli = Cli::try_parse_from(["welcome-card", "--name", "Ada", "--handle", "ada"]).unwrap();
        assert!(!cli.no_system_fonts);

        let cli = Cli::try_parse_from([
            "welcome-card",
            "--name",
            "Ada",
            "--handle",
            "ada",
            "--no-system-fonts",
        ])
        .unwrap();
        assert!(cli.no_system_fonts);
    }

    #[test]
    fn avatar_sources_are_exclusive() {
        let err = Cli::try_parse_from([
            "welcome-card",
            "--name",
            "Ada",
            "--handle",
            "ada",
            "--avatar-url",
            "https://example.test/a.png",
            "--avatar-file",
            "a.png",
        ]);
        assert!(err.is_err());
    }
}
