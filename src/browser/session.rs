//! Lazy, shared browser session.
//!
//! `acquire` and `release` are serialized by one lock; work done through an
//! acquired handle is not.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::debug;

use super::launch::{BrowserLaunchConfig, ChromeLauncher};
use super::{BrowserSession, Launcher, TransportError};
use crate::{RenderError, Result};

/// Observable lifecycle of the shared browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    /// A launch began but never finished (its future was dropped).
    Starting,
    Ready,
    Closed,
}

enum Slot<S> {
    NotStarted,
    Starting,
    Ready(Arc<S>),
    Closed,
}

impl<S> Slot<S> {
    fn state(&self) -> SessionState {
        match self {
            Slot::NotStarted => SessionState::NotStarted,
            Slot::Starting => SessionState::Starting,
            Slot::Ready(_) => SessionState::Ready,
            Slot::Closed => SessionState::Closed,
        }
    }
}

/// Owns the one browser process shared by all render calls.
pub struct SessionManager<L: Launcher = ChromeLauncher> {
    launcher: L,
    config: BrowserLaunchConfig,
    slot: Mutex<Slot<L::Session>>,
}

impl SessionManager<ChromeLauncher> {
    pub fn new(config: BrowserLaunchConfig) -> Self {
        Self::with_launcher(ChromeLauncher, config)
    }
}

impl<L: Launcher> SessionManager<L> {
    pub fn with_launcher(launcher: L, config: BrowserLaunchConfig) -> Self {
        Self {
            launcher,
            config,
            slot: Mutex::new(Slot::NotStarted),
        }
    }

    /// Current lifecycle state; waits for an in-flight launch or shutdown.
    pub async fn state(&self) -> SessionState {
        self.slot.lock().await.state()
    }

    /// Returns the live session, launching it on first use.
    ///
    /// A failed launch leaves the manager not started so a later call retries.
    pub async fn acquire(&self) -> Result<Arc<L::Session>> {
        let mut slot = self.slot.lock().await;
        if let Slot::Ready(session) = &*slot {
            return Ok(Arc::clone(session));
        }

        *slot = Slot::Starting;
        let session = match self.start().await {
            Ok(session) => Arc::new(session),
            Err(err) => {
                *slot = Slot::NotStarted;
                return Err(RenderError::Launch(err));
            }
        };
        *slot = Slot::Ready(Arc::clone(&session));
        debug!("browser session ready");
        Ok(session)
    }

    async fn start(&self) -> std::result::Result<L::Session, TransportError> {
        let limit = self.config.launch_timeout;
        let session = timeout(limit, self.launcher.launch(&self.config))
            .await
            .map_err(|_| {
                TransportError::protocol(format!("browser did not start within {:?}", limit))
            })??;

        let confirmed = match timeout(limit, session.ping()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::protocol(format!(
                "browser did not respond within {:?}",
                limit
            ))),
        };
        if let Err(err) = confirmed {
            debug!(%err, "browser failed startup confirmation");
            session.shutdown().await;
            return Err(err);
        }
        Ok(session)
    }

    /// Shuts the browser down. No-op when never started; safe to repeat.
    ///
    /// Handles obtained earlier stay valid as values, but their protocol
    /// calls fail once the process is gone.
    pub async fn release(&self) {
        let mut slot = self.slot.lock().await;
        match std::mem::replace(&mut *slot, Slot::Closed) {
            Slot::Ready(session) => {
                debug!("shutting down browser session");
                session.shutdown().await;
            }
            Slot::NotStarted => *slot = Slot::NotStarted,
            Slot::Starting | Slot::Closed => {}
        }
    }
}
