//! Scripted in-process browser used by unit tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};

use super::{BrowserLaunchConfig, BrowserSession, Launcher, RenderTarget, TransportError};
use crate::geometry::{BoundingRect, PrintLayout};
use crate::Viewport;

pub(crate) const FAKE_SVG: &str =
    r#"<svg id="my-svg" xmlns="http://www.w3.org/2000/svg" viewBox="0 0 300 175"></svg>"#;
pub(crate) const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";
pub(crate) const FAKE_PDF: &[u8] = b"%PDF-1.4 fake";

#[derive(Debug, Clone, Default)]
pub(crate) struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub(crate) fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Protocol operations observed by a [`FakeTarget`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    SetViewport(Viewport, f64),
    LoadDocument(String),
    Evaluate(String),
    CapturePng(BoundingRect),
    PrintPdf(PrintLayout),
    Background(bool),
    Close,
}

#[derive(Clone)]
pub(crate) struct FakeTarget {
    probes: Vec<Value>,
    probe_index: Counter,
    record: Value,
    svg: Option<String>,
    bounds: Option<BoundingRect>,
    fail_on: Option<&'static str>,
    hang_on: Vec<&'static str>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Default for FakeTarget {
    fn default() -> Self {
        let record = json!({ "success": true, "title": null, "desc": null });
        Self {
            probes: vec![json!({ "svg": true, "record": record.clone() })],
            probe_index: Counter::default(),
            record,
            svg: Some(FAKE_SVG.to_string()),
            bounds: Some(BoundingRect {
                x: 8.0,
                y: 8.0,
                width: 300.0,
                height: 175.0,
            }),
            fail_on: None,
            hang_on: Vec::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeTarget {
    /// A page that never finishes rendering.
    pub(crate) fn pending() -> Self {
        Self::default()
            .with_probes(vec![json!({ "svg": false, "record": null })])
            .with_record(Value::Null)
    }

    /// A page whose library rejected the definition.
    pub(crate) fn failing(message: &str) -> Self {
        let record = json!({ "success": false, "error": message });
        Self::default()
            .with_probes(vec![json!({ "svg": false, "record": record.clone() })])
            .with_record(record)
            .with_svg(None)
    }

    /// Probe results returned in order; the last one repeats.
    pub(crate) fn with_probes(mut self, probes: Vec<Value>) -> Self {
        self.probes = probes;
        self
    }

    pub(crate) fn with_record(mut self, record: Value) -> Self {
        self.record = record;
        self
    }

    pub(crate) fn with_svg(mut self, svg: Option<&str>) -> Self {
        self.svg = svg.map(str::to_string);
        self
    }

    pub(crate) fn with_bounds(mut self, bounds: Option<BoundingRect>) -> Self {
        self.bounds = bounds;
        self
    }

    /// Makes the named operation fail with a protocol error.
    pub(crate) fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    /// Makes the named operation never resolve.
    pub(crate) fn hanging_on(mut self, op: &'static str) -> Self {
        self.hang_on.push(op);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(crate) fn probe_count(&self) -> usize {
        self.probe_index.get()
    }

    fn record_call(&self, op: &'static str, call: Call) -> Result<(), TransportError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.fail_on == Some(op) {
            return Err(TransportError::protocol(format!("{op} failed")));
        }
        Ok(())
    }

    async fn hang_if(&self, op: &'static str) {
        if self.hang_on.contains(&op) {
            std::future::pending::<()>().await;
        }
    }

    fn next_probe(&self) -> Value {
        let index = self.probe_index.bump() - 1;
        self.probes
            .get(index.min(self.probes.len().saturating_sub(1)))
            .cloned()
            .unwrap_or(Value::Null)
    }
}

impl RenderTarget for FakeTarget {
    async fn set_viewport(&self, viewport: Viewport, scale: f64) -> Result<(), TransportError> {
        self.record_call("set_viewport", Call::SetViewport(viewport, scale))
    }

    async fn load_document(&self, html: &str) -> Result<(), TransportError> {
        self.record_call("load_document", Call::LoadDocument(html.to_string()))
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, TransportError> {
        self.record_call("evaluate", Call::Evaluate(expression.to_string()))?;
        let value = if expression.contains("XMLSerializer") {
            self.svg.clone().map(Value::String).unwrap_or(Value::Null)
        } else if expression.contains("getBoundingClientRect") {
            self.bounds
                .map(|b| json!({ "x": b.x, "y": b.y, "width": b.width, "height": b.height }))
                .unwrap_or(Value::Null)
        } else if expression.contains("svg:") {
            self.next_probe()
        } else {
            self.record.clone()
        };
        Ok(value)
    }

    async fn capture_png(&self, clip: BoundingRect) -> Result<Vec<u8>, TransportError> {
        self.record_call("capture_png", Call::CapturePng(clip))?;
        self.hang_if("capture_png").await;
        Ok(FAKE_PNG.to_vec())
    }

    async fn print_pdf(&self, layout: PrintLayout) -> Result<Vec<u8>, TransportError> {
        self.record_call("print_pdf", Call::PrintPdf(layout))?;
        self.hang_if("print_pdf").await;
        Ok(FAKE_PDF.to_vec())
    }

    async fn set_transparent_background(&self, transparent: bool) -> Result<(), TransportError> {
        self.record_call("background", Call::Background(transparent))
    }

    async fn close(self) {
        let _ = self.record_call("close", Call::Close);
    }
}

type TargetFactory = Arc<dyn Fn() -> FakeTarget + Send + Sync>;

pub(crate) struct FakeLauncher {
    factory: TargetFactory,
    delay: Duration,
    failing_launches: Arc<AtomicUsize>,
    failing_pings: bool,
    failing_open: bool,
    pub(crate) launches: Counter,
    pub(crate) shutdowns: Counter,
    pub(crate) targets: Counter,
}

impl FakeLauncher {
    pub(crate) fn new<F>(factory: F) -> Self
    where
        F: Fn() -> FakeTarget + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            delay: Duration::ZERO,
            failing_launches: Arc::new(AtomicUsize::new(0)),
            failing_pings: false,
            failing_open: false,
            launches: Counter::default(),
            shutdowns: Counter::default(),
            targets: Counter::default(),
        }
    }

    /// Hands out clones of `target`, so its call log stays observable.
    pub(crate) fn serving(target: &FakeTarget) -> Self {
        let target = target.clone();
        Self::new(move || target.clone())
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing_launches(self, count: usize) -> Self {
        self.failing_launches.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn failing_pings(mut self) -> Self {
        self.failing_pings = true;
        self
    }

    pub(crate) fn failing_open(mut self) -> Self {
        self.failing_open = true;
        self
    }
}

impl Launcher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self, _config: &BrowserLaunchConfig) -> Result<FakeSession, TransportError> {
        self.launches.bump();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let remaining = self.failing_launches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_launches.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::protocol("browser executable not found"));
        }
        Ok(FakeSession {
            factory: Arc::clone(&self.factory),
            failing_ping: self.failing_pings,
            failing_open: self.failing_open,
            shut_down: AtomicBool::new(false),
            pings: Counter::default(),
            shutdowns: self.shutdowns.clone(),
            targets: self.targets.clone(),
        })
    }
}

pub(crate) struct FakeSession {
    factory: TargetFactory,
    failing_ping: bool,
    failing_open: bool,
    shut_down: AtomicBool,
    pub(crate) pings: Counter,
    shutdowns: Counter,
    targets: Counter,
}

impl fmt::Debug for FakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FakeSession")
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .field("pings", &self.pings.get())
            .finish_non_exhaustive()
    }
}

impl BrowserSession for FakeSession {
    type Target = FakeTarget;

    async fn ping(&self) -> Result<(), TransportError> {
        self.pings.bump();
        if self.failing_ping {
            return Err(TransportError::protocol("no response"));
        }
        Ok(())
    }

    async fn open_target(&self) -> Result<FakeTarget, TransportError> {
        if self.failing_open || self.shut_down.load(Ordering::SeqCst) {
            return Err(TransportError::protocol("target creation failed"));
        }
        self.targets.bump();
        Ok((self.factory)())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.shutdowns.bump();
    }
}
