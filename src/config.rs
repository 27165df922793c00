use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::assets::RendererAssets;
use crate::browser::BrowserLaunchConfig;
use crate::options::{BackgroundColor, DiagramConfig, RenderOptions, DEFAULT_THEME};
use crate::render::DEFAULT_RENDER_TIMEOUT;
use crate::{RenderError, Viewport};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub browser: BrowserLaunchConfig,
    pub render: RenderSection,
    pub assets: AssetsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub theme: String,
    pub background_color: BackgroundColor,
    pub width: u32,
    pub height: u32,
    pub scale: f64,
    pub css: Option<String>,
    pub svg_id: Option<String>,
    /// Merged over the theme default; keys here win.
    pub diagram_config: Map<String, Value>,
}

impl Default for RenderSection {
    fn default() -> Self {
        let viewport = Viewport::default();
        Self {
            timeout: DEFAULT_RENDER_TIMEOUT,
            theme: DEFAULT_THEME.to_string(),
            background_color: BackgroundColor::default(),
            width: viewport.width,
            height: viewport.height,
            scale: 1.0,
            css: None,
            svg_id: None,
            diagram_config: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsSection {
    /// `mermaid.min.js`; required to render.
    pub library: Option<PathBuf>,
    /// Extension script registering extra diagram types.
    pub extension: Option<PathBuf>,
}

impl Config {
    /// `$XDG_CONFIG_HOME/mmd/config.toml`, falling back to `~/.config/mmd/config.toml`.
    pub fn central_config_path() -> Option<PathBuf> {
        let base = env::var_os("XDG_CONFIG_HOME")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
        Some(base.join("mmd").join("config.toml"))
    }

    /// Loads `path`, else the central config if it exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::central_config_path().filter(|p| p.is_file()) {
                Some(central) => Self::from_file(&central),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let render = &self.render;
        if render.width == 0 || render.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "render.width and render.height must be positive (got {}x{})",
                render.width, render.height
            )));
        }
        if !render.scale.is_finite() || render.scale <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "render.scale must be positive (got {})",
                render.scale
            )));
        }
        if render.timeout.is_zero() {
            return Err(ConfigError::Invalid("render.timeout must be non-zero".into()));
        }
        if self.browser.launch_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "browser.launch_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.render.width, self.render.height)
    }

    /// Render options described by the `[render]` section.
    pub fn render_options(&self) -> RenderOptions {
        let mut diagram_config = DiagramConfig::with_theme(self.render.theme.clone());
        diagram_config.merge(self.render.diagram_config.clone());
        RenderOptions {
            diagram_config,
            background_color: self.render.background_color.clone(),
            css: self.render.css.clone(),
            svg_id: self.render.svg_id.clone(),
            viewport: self.viewport(),
            scale: self.render.scale,
            ..RenderOptions::default()
        }
    }

    /// Reads the scripts named in `[assets]`.
    pub fn renderer_assets(&self) -> crate::Result<RendererAssets> {
        let library = self.assets.library.as_deref().ok_or_else(|| {
            RenderError::config(
                "No rendering library configured: set assets.library or pass --library",
            )
        })?;
        RendererAssets::from_files(library, self.assets.extension.as_deref())
    }
}
