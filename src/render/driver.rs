//! Per-call render state machine.
//!
//! Drives one browsing context from a blank page to a completion record:
//! `Idle -> ViewportSet -> Loaded -> AwaitingCompletion -> Completed | Failed`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tokio::time::{sleep_until, timeout, timeout_at, Instant};
use tracing::debug;

use crate::browser::{RenderTarget, TransportError};
use crate::options::RenderOptions;
use crate::{RenderError, Result};

/// Overall deadline covering navigation through the completion wait.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INITIAL: Duration = Duration::from_millis(10);
const POLL_MAX: Duration = Duration::from_millis(250);

/// Extra time allowed for the diagnostic record read after the deadline.
const RECORD_GRACE: Duration = Duration::from_secs(1);

/// Level-triggered readiness check: is the SVG in the container, and has the
/// page written its completion record yet.
pub(crate) const PROBE_SCRIPT: &str = "({ svg: document.querySelector('#container svg') !== null, record: window.__mmd_result ?? null })";

pub(crate) const RECORD_SCRIPT: &str = "window.__mmd_result";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    ViewportSet,
    Loaded,
    AwaitingCompletion,
    Completed,
    Failed,
}

/// Outcome the page script writes once rendering settles.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionRecord {
    pub success: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Metadata of a successful render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    pub title: Option<String>,
    pub desc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Probe {
    #[serde(default)]
    svg: bool,
    #[serde(default)]
    record: Value,
}

enum Step<T> {
    Done(T),
    Expired,
}

pub struct RenderDriver<'a, T: RenderTarget> {
    target: &'a T,
    timeout: Duration,
    deadline: Instant,
    phase: RenderPhase,
}

impl<'a, T: RenderTarget> RenderDriver<'a, T> {
    /// The deadline starts counting now.
    pub fn new(target: &'a T, timeout: Duration) -> Self {
        Self {
            target,
            timeout,
            deadline: Instant::now() + timeout,
            phase: RenderPhase::Idle,
        }
    }

    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Instant the whole call must finish by, extraction included.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Loads `html` and waits for its completion record.
    pub async fn run(&mut self, html: &str, options: &RenderOptions) -> Result<Completion> {
        let outcome = self.drive(html, options).await;
        self.enter(if outcome.is_ok() {
            RenderPhase::Completed
        } else {
            RenderPhase::Failed
        });
        outcome
    }

    async fn drive(&mut self, html: &str, options: &RenderOptions) -> Result<Completion> {
        let resized = self.target.set_viewport(options.viewport, options.scale);
        if let Step::Expired = self.step(resized).await? {
            return Err(self.timed_out().await);
        }
        self.enter(RenderPhase::ViewportSet);

        if let Step::Expired = self.step(self.target.load_document(html)).await? {
            return Err(self.timed_out().await);
        }
        self.enter(RenderPhase::Loaded);

        let Some(record) = self.await_record().await? else {
            return Err(self.timed_out().await);
        };
        let record: CompletionRecord = serde_json::from_value(record)?;
        if record.success {
            Ok(Completion {
                title: record.title,
                desc: record.desc,
            })
        } else {
            let message = record
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "unknown diagram rendering error".to_string());
            Err(RenderError::DiagramRender(message))
        }
    }

    async fn step<R>(
        &self,
        fut: impl std::future::Future<Output = std::result::Result<R, TransportError>>,
    ) -> Result<Step<R>> {
        match timeout_at(self.deadline, fut).await {
            Ok(result) => result.map(Step::Done).map_err(RenderError::Navigation),
            Err(_) => Ok(Step::Expired),
        }
    }

    /// Polls with backoff until a record appears; `None` once the deadline passes.
    async fn await_record(&mut self) -> Result<Option<Value>> {
        let mut delay = POLL_INITIAL;
        loop {
            let Step::Done(probe) = self.step(self.target.evaluate(PROBE_SCRIPT)).await? else {
                return Ok(None);
            };
            let probe: Probe = serde_json::from_value(probe)?;
            if (probe.svg || !probe.record.is_null()) && self.phase == RenderPhase::Loaded {
                self.enter(RenderPhase::AwaitingCompletion);
            }
            if !probe.record.is_null() {
                return Ok(Some(probe.record));
            }

            let now = Instant::now();
            if now >= self.deadline {
                return Ok(None);
            }
            sleep_until((now + delay).min(self.deadline)).await;
            delay = (delay * 2).min(POLL_MAX);
        }
    }

    /// Builds the timeout error, reading whatever record the page left behind.
    async fn timed_out(&self) -> RenderError {
        let record = match timeout(RECORD_GRACE, self.target.evaluate(RECORD_SCRIPT)).await {
            Ok(Ok(value)) if !value.is_null() => Some(value),
            Ok(Err(err)) => {
                debug!(%err, "could not read completion record after timeout");
                None
            }
            _ => None,
        };
        let diagram_error = record
            .as_ref()
            .and_then(|value| serde_json::from_value::<CompletionRecord>(value.clone()).ok())
            .filter(|record| !record.success)
            .and_then(|record| record.error);
        RenderError::RenderTimeout {
            waited: self.timeout,
            record: record.map(|value| value.to_string()),
            diagram_error,
        }
    }

    fn enter(&mut self, phase: RenderPhase) {
        debug!(from = ?self.phase, to = ?phase, "render phase");
        self.phase = phase;
    }
}
