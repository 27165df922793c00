//! The render pipeline.
//!
//! [`Renderer`] ties the pieces together for one call: build the page, take a
//! browsing context from the shared session, drive it to completion, extract
//! the requested artifact and release the context again.
//!
//! # Module Structure
//!
//! - [`driver`] - Per-call state machine up to the completion record
//! - [`extract`] - SVG, PNG and PDF extraction from a completed page
//!
//! # Example
//!
//! ```no_run
//! use mmd_lib::{BrowserLaunchConfig, OutputKind, RenderOptions, Renderer, RendererAssets};
//!
//! # async fn example() -> mmd_lib::Result<()> {
//! let assets = RendererAssets::new(std::fs::read_to_string("mermaid.min.js")?);
//! let renderer = Renderer::new(BrowserLaunchConfig::default(), assets);
//! let result = renderer
//!     .render("graph TD; A-->B;", OutputKind::Svg, &RenderOptions::default())
//!     .await?;
//! std::fs::write("diagram.svg", &result.data)?;
//! renderer.close().await;
//! # Ok(())
//! # }
//! ```

pub mod driver;
pub mod extract;

use std::time::Duration;

use tokio::time::timeout_at;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::assets::RendererAssets;
use crate::browser::{
    BrowserLaunchConfig, BrowserSession, ChromeLauncher, Launcher, RenderTarget, SessionManager,
};
use crate::options::{OutputKind, RenderOptions};
use crate::page::build_page;
use crate::{RenderError, Result};

pub use driver::{
    Completion, CompletionRecord, RenderDriver, RenderPhase, DEFAULT_RENDER_TIMEOUT,
};

/// Artifact of one render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub data: Vec<u8>,
    /// Text of the SVG's first `<title>`, if any.
    pub title: Option<String>,
    /// Text of the SVG's first `<desc>`, if any.
    pub desc: Option<String>,
}

pub struct Renderer<L: Launcher = ChromeLauncher> {
    sessions: SessionManager<L>,
    assets: RendererAssets,
    timeout: Duration,
}

impl Renderer<ChromeLauncher> {
    pub fn new(config: BrowserLaunchConfig, assets: RendererAssets) -> Self {
        Self::with_launcher(ChromeLauncher, config, assets)
    }
}

impl<L: Launcher> Renderer<L> {
    pub fn with_launcher(launcher: L, config: BrowserLaunchConfig, assets: RendererAssets) -> Self {
        Self {
            sessions: SessionManager::with_launcher(launcher, config),
            assets,
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    /// Overrides the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionManager<L> {
        &self.sessions
    }

    /// Renders `definition` into `kind`.
    pub async fn render(
        &self,
        definition: &str,
        kind: OutputKind,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        self.render_with_cancel(definition, kind, options, &CancellationToken::new())
            .await
    }

    /// Like [`Renderer::render`], aborting with [`RenderError::Cancelled`] at
    /// the next suspension point once `cancel` fires. The browsing context is
    /// released either way.
    pub async fn render_with_cancel(
        &self,
        definition: &str,
        kind: OutputKind,
        options: &RenderOptions,
        cancel: &CancellationToken,
    ) -> Result<RenderResult> {
        options.validate()?;
        let html = build_page(definition, options, &self.assets)?;

        let session = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            session = self.sessions.acquire() => session?,
        };
        let target = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RenderError::Cancelled),
            target = session.open_target() => target.map_err(RenderError::Navigation)?,
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RenderError::Cancelled),
            outcome = self.render_in(&target, &html, kind, options) => outcome,
        };
        target.close().await;

        match &outcome {
            Ok(result) => debug!(%kind, bytes = result.data.len(), "render finished"),
            Err(err) => debug!(%kind, %err, "render failed"),
        }
        outcome
    }

    async fn render_in(
        &self,
        target: &<L::Session as BrowserSession>::Target,
        html: &str,
        kind: OutputKind,
        options: &RenderOptions,
    ) -> Result<RenderResult> {
        let mut driver = RenderDriver::new(target, self.timeout);
        let completion = driver.run(html, options).await?;
        let extraction = extract::extract(target, kind, options);
        let data = timeout_at(driver.deadline(), extraction)
            .await
            .map_err(|_| RenderError::RenderTimeout {
                waited: self.timeout,
                record: None,
                diagram_error: None,
            })??;
        Ok(RenderResult {
            data,
            title: completion.title,
            desc: completion.desc,
        })
    }

    /// Shuts the shared browser down. Safe to call more than once.
    pub async fn close(&self) {
        self.sessions.release().await;
    }
}
