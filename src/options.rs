//! Per-call render options.
//!
//! These are plain values produced by the CLI/config layer and consumed
//! read-only by the page builder, render driver and extractor.

use palette::Srgb;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::{RenderError, Result, Viewport};

/// Default diagram theme.
pub const DEFAULT_THEME: &str = "default";

/// Default id of the rendered SVG root element.
pub const DEFAULT_SVG_ID: &str = "my-svg";

/// Diagram library configuration passed to `mermaid.initialize`.
///
/// Always carries a `theme` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramConfig(Map<String, Value>);

impl Default for DiagramConfig {
    fn default() -> Self {
        Self::with_theme(DEFAULT_THEME)
    }
}

impl DiagramConfig {
    pub fn with_theme(theme: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("theme".to_string(), Value::String(theme.into()));
        Self(map)
    }

    /// Inserts an arbitrary serializable value under `key`.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(RenderError::ConfigSerialization)?;
        self.0.insert(key.into(), value);
        Ok(())
    }

    /// Overlays `entries` on top of the current mapping; incoming keys win.
    pub fn merge(&mut self, entries: Map<String, Value>) {
        for (key, value) in entries {
            self.0.insert(key, value);
        }
    }

    pub fn theme(&self) -> Option<&str> {
        self.0.get("theme").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("Invalid background color '{0}': expected a CSS color (e.g., white, '#F0F0F0', rgb(0,0,0)) or 'transparent'")]
    Invalid(String),
}

/// Page/SVG background: a CSS color or the transparent sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BackgroundColor {
    Transparent,
    Css(String),
}

impl Default for BackgroundColor {
    fn default() -> Self {
        BackgroundColor::Css("white".to_string())
    }
}

impl BackgroundColor {
    pub fn is_transparent(&self) -> bool {
        matches!(self, BackgroundColor::Transparent)
    }

    pub fn as_css(&self) -> &str {
        match self {
            BackgroundColor::Transparent => "transparent",
            BackgroundColor::Css(color) => color,
        }
    }
}

const CSS_COLOR_FUNCTIONS: &[&str] = &["rgb(", "rgba(", "hsl(", "hsla("];

impl FromStr for BackgroundColor {
    type Err = ColorParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let value = s.trim();
        let lower = value.to_ascii_lowercase();
        if lower == "transparent" {
            return Ok(BackgroundColor::Transparent);
        }

        let valid = if let Some(hex) = value.strip_prefix('#') {
            // palette handles #rgb/#rrggbb; CSS also allows an alpha nibble/byte.
            value.parse::<Srgb<u8>>().is_ok()
                || (matches!(hex.len(), 4 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()))
        } else if CSS_COLOR_FUNCTIONS.iter().any(|f| lower.starts_with(f)) {
            lower.ends_with(')')
        } else {
            palette::named::from_str(&lower).is_some()
        };

        if valid {
            Ok(BackgroundColor::Css(value.to_string()))
        } else {
            Err(ColorParseError::Invalid(s.to_string()))
        }
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = ColorParseError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        color.as_css().to_string()
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_css())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IconPackParseError {
    #[error("Invalid icon pack '{0}': expected NAME#URL")]
    MissingSeparator(String),
    #[error("Invalid icon pack '{0}': name must not be empty")]
    EmptyName(String),
    #[error("Invalid icon pack URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

/// Named icon pack fetched lazily by the page from `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPack {
    pub name: String,
    pub url: String,
}

impl IconPack {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

impl FromStr for IconPack {
    type Err = IconPackParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, url) = s
            .split_once('#')
            .ok_or_else(|| IconPackParseError::MissingSeparator(s.to_string()))?;
        if name.trim().is_empty() {
            return Err(IconPackParseError::EmptyName(s.to_string()));
        }
        Url::parse(url).map_err(|e| IconPackParseError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(IconPack::new(name.trim(), url))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Output format must be one of \"svg\", \"png\" or \"pdf\" (got '{0}')")]
pub struct OutputKindParseError(pub String);

/// Requested artifact encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Svg,
    Png,
    Pdf,
}

impl OutputKind {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::Svg => "svg",
            OutputKind::Png => "png",
            OutputKind::Pdf => "pdf",
        }
    }

    /// Infers the kind from a file extension. Markdown outputs embed SVGs.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "md" | "markdown" => Some(OutputKind::Svg),
            other => other.parse().ok(),
        }
    }
}

impl FromStr for OutputKind {
    type Err = OutputKindParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(OutputKind::Svg),
            "png" => Ok(OutputKind::Png),
            "pdf" => Ok(OutputKind::Pdf),
            _ => Err(OutputKindParseError(s.to_string())),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Immutable options for one render call.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub diagram_config: DiagramConfig,
    pub background_color: BackgroundColor,
    /// Extra stylesheet text appended inside the SVG root.
    pub css: Option<String>,
    /// Id of the SVG root; [`DEFAULT_SVG_ID`] when unset.
    pub svg_id: Option<String>,
    pub viewport: Viewport,
    /// Device scale factor.
    pub scale: f64,
    pub pdf_fit: bool,
    pub svg_fit: bool,
    pub icon_packs: Vec<IconPack>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            diagram_config: DiagramConfig::default(),
            background_color: BackgroundColor::default(),
            css: None,
            svg_id: None,
            viewport: Viewport::default(),
            scale: 1.0,
            pdf_fit: false,
            svg_fit: false,
            icon_packs: Vec::new(),
        }
    }
}

impl RenderOptions {
    pub fn svg_id(&self) -> &str {
        self.svg_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(DEFAULT_SVG_ID)
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(RenderError::config(format!(
                "Page size must be positive (got {})",
                self.viewport
            )));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(RenderError::config(format!(
                "Scale factor must be positive (got {})",
                self.scale
            )));
        }
        Ok(())
    }
}
