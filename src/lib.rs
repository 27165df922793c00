//! Mermaid Diagram (MMD) Renderer Library
//!
//! Renders Mermaid diagram definitions to SVG, PNG or PDF by driving a
//! headless Chrome over the devtools protocol. One browser process is shared
//! across calls; each call renders inside its own isolated browsing context.
//!
//! # Module Overview
//!
//! - [`browser`] - Browser launch and the shared session lifecycle
//! - [`page`] - Self-contained HTML page that renders one diagram
//! - [`render`] - Render driver, artifact extraction and the [`Renderer`] facade
//! - [`options`] - Per-call render options
//! - [`config`] - Configuration file support
//! - [`error`] - Error taxonomy and CLI payloads
//!
//! # Example
//!
//! ```no_run
//! use mmd_lib::{Config, OutputKind, Renderer};
//!
//! # async fn example() -> mmd_lib::Result<()> {
//! let config = Config::load(None).map_err(|e| mmd_lib::RenderError::config(e.to_string()))?;
//! let renderer = Renderer::new(config.browser.clone(), config.renderer_assets()?)
//!     .with_timeout(config.render.timeout);
//!
//! let result = renderer
//!     .render("graph TD; A-->B;", OutputKind::Png, &config.render_options())
//!     .await?;
//! std::fs::write("diagram.png", &result.data)?;
//! renderer.close().await;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod browser;
pub mod config;
pub mod error;
pub mod geometry;
pub mod options;
pub mod page;
pub mod render;
pub mod viewport;

pub use assets::RendererAssets;
pub use browser::{BrowserLaunchConfig, SessionManager, SessionState, TransportError};
pub use config::{Config, ConfigError};
pub use error::{ErrorCategory, ErrorPayload, RenderError, Result};
pub use geometry::{BoundingRect, PaperSize, PrintLayout};
pub use options::{BackgroundColor, DiagramConfig, IconPack, OutputKind, RenderOptions};
pub use page::build_page;
pub use render::{RenderResult, Renderer, DEFAULT_RENDER_TIMEOUT};
pub use viewport::Viewport;
