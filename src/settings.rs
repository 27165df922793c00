use std::ffi::OsString;
use std::path::{Path, PathBuf};

use mmd_lib::{Config, OutputKind, RenderError, RenderOptions};

use crate::cli::Cli;

/// Where the diagram definition comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Stdin; `warn` is set when no `-i` was given at all.
    Stdin { warn: bool },
    File(PathBuf),
}

/// Where the artifact goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    Stdout,
    File(PathBuf),
}

const OUTPUT_EXTENSIONS: &[&str] = &["svg", "png", "pdf", "md", "markdown"];

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/mmd/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, RenderError> {
    let cfg = Config::load(path)
        .map_err(|e| RenderError::Config(format!("Failed to read config: {}", e)))?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        RenderError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Applies explicitly given CLI flags on top of the loaded config.
pub fn apply_overrides(config: &mut Config, cli: &Cli) {
    let render = &mut config.render;
    if let Some(theme) = &cli.theme {
        render.theme = theme.clone();
        // An explicit flag beats a theme set in the diagram_config table.
        render.diagram_config.remove("theme");
    }
    if let Some(width) = cli.width {
        render.width = width;
    }
    if let Some(height) = cli.height {
        render.height = height;
    }
    if let Some(color) = &cli.background_color {
        render.background_color = color.clone();
    }
    if let Some(scale) = cli.scale {
        render.scale = scale;
    }
    if let Some(svg_id) = &cli.svg_id {
        render.svg_id = Some(svg_id.clone());
    }
    if let Some(library) = &cli.library {
        config.assets.library = Some(library.clone());
    }
    if let Some(extension) = &cli.extension {
        config.assets.extension = Some(extension.clone());
    }
}

/// Render options from the merged config plus the CLI-only switches.
pub fn render_options(config: &Config, cli: &Cli) -> RenderOptions {
    RenderOptions {
        pdf_fit: cli.pdf_fit,
        svg_fit: cli.svg_fit,
        icon_packs: cli.icon_packs.clone(),
        ..config.render_options()
    }
}

pub fn resolve_input(input: Option<&Path>) -> Result<Source, RenderError> {
    match input {
        None => Ok(Source::Stdin { warn: true }),
        Some(path) if path == Path::new("-") => Ok(Source::Stdin { warn: false }),
        Some(path) if !path.exists() => Err(RenderError::Config(format!(
            "Input file \"{}\" doesn't exist",
            path.display()
        ))),
        Some(path) => Ok(Source::File(path.to_path_buf())),
    }
}

/// Picks the output destination and format.
///
/// Without `-o` the output is the input path plus the format's extension
/// (`out.<ext>` for stdin). `-` means stdout, defaulting to svg.
pub fn resolve_output(
    input: &Source,
    output: Option<&Path>,
    format: Option<OutputKind>,
) -> Result<(Sink, OutputKind), RenderError> {
    let path = match output {
        Some(path) if path == Path::new("-") => {
            return Ok((Sink::Stdout, format.unwrap_or(OutputKind::Svg)));
        }
        Some(path) => {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase);
            if !ext.is_some_and(|e| OUTPUT_EXTENSIONS.contains(&e.as_str())) {
                return Err(RenderError::config(
                    "Output file must end with \".md\"/\".markdown\", \".svg\", \".png\" or \".pdf\"",
                ));
            }
            path.to_path_buf()
        }
        None => {
            let ext = format.unwrap_or(OutputKind::Svg).extension();
            match input {
                Source::File(input) => {
                    let mut name: OsString = input.as_os_str().to_owned();
                    name.push(".");
                    name.push(ext);
                    PathBuf::from(name)
                }
                Source::Stdin { .. } => PathBuf::from(format!("out.{ext}")),
            }
        }
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    if !dir.is_dir() {
        return Err(RenderError::Config(format!(
            "Output directory \"{}/\" doesn't exist",
            dir.display()
        )));
    }

    let kind = match format {
        Some(kind) => kind,
        None => OutputKind::from_path(&path).ok_or_else(|| {
            RenderError::config("Output format must be one of \"svg\", \"png\" or \"pdf\"")
        })?,
    };
    Ok((Sink::File(path), kind))
}
