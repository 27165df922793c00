//! Browser session management over the Chrome devtools protocol.
//!
//! One browser process is launched lazily and shared by every render call;
//! each call works inside its own isolated browsing context.
//!
//! # Module Structure
//!
//! - [`launch`] - Launch configuration and the chromiumoxide launcher
//! - [`session`] - Lazy, lock-guarded session lifecycle
//! - [`cdp`] - chromiumoxide-backed session and browsing context
//!
//! # Example
//!
//! ```no_run
//! use mmd_lib::browser::{BrowserLaunchConfig, BrowserSession, SessionManager};
//!
//! # async fn example() -> mmd_lib::Result<()> {
//! let sessions = SessionManager::new(BrowserLaunchConfig::default());
//! let session = sessions.acquire().await?;
//! let _target = session.open_target().await;
//! sessions.release().await;
//! # Ok(())
//! # }
//! ```

mod cdp;
#[cfg(test)]
pub(crate) mod fake;
mod launch;
mod session;

use std::future::Future;

use serde_json::Value;
use thiserror::Error;

use crate::geometry::{BoundingRect, PrintLayout};
use crate::Viewport;

pub use cdp::{CdpSession, CdpTarget};
pub use launch::{BrowserLaunchConfig, ChromeLauncher, DEFAULT_LAUNCH_TIMEOUT, FIXED_BROWSER_ARGS};
pub use session::{SessionManager, SessionState};

/// Failure talking to the browser process.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("{0}")]
    Protocol(String),
}

impl TransportError {
    pub fn protocol(message: impl Into<String>) -> Self {
        TransportError::Protocol(message.into())
    }
}

/// Starts browser processes.
pub trait Launcher: Send + Sync + 'static {
    type Session: BrowserSession;

    fn launch(
        &self,
        config: &BrowserLaunchConfig,
    ) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;
}

/// A running browser process that hands out isolated browsing contexts.
pub trait BrowserSession: Send + Sync + 'static {
    type Target: RenderTarget;

    /// No-op round-trip confirming the process answers.
    fn ping(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn open_target(&self) -> impl Future<Output = Result<Self::Target, TransportError>> + Send;

    fn shutdown(&self) -> impl Future<Output = ()> + Send;
}

/// One isolated browsing context owned by a single render call.
pub trait RenderTarget: Send + Sync {
    fn set_viewport(
        &self,
        viewport: Viewport,
        scale: f64,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Replaces the document of the context's root frame with `html`.
    fn load_document(&self, html: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Evaluates `expression` and returns its JSON value (`null` for undefined).
    fn evaluate(&self, expression: &str)
        -> impl Future<Output = Result<Value, TransportError>> + Send;

    fn capture_png(
        &self,
        clip: BoundingRect,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    fn print_pdf(
        &self,
        layout: PrintLayout,
    ) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Overrides (or restores) the default page background with transparent black.
    fn set_transparent_background(
        &self,
        transparent: bool,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn close(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}
