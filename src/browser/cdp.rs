//! chromiumoxide-backed session and browsing context.

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::dom::Rgba;
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDefaultBackgroundColorOverrideParams, SetDeviceMetricsOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, PrintToPdfParams,
    SetDocumentContentParams, Viewport as ClipRect,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{BrowserSession, RenderTarget, TransportError};
use crate::geometry::{BoundingRect, PrintLayout};
use crate::Viewport;

/// A launched browser plus the task draining its event stream.
pub struct CdpSession {
    browser: Arc<Browser>,
    events: Mutex<Option<JoinHandle<()>>>,
}

impl CdpSession {
    pub(crate) fn new(browser: Browser, events: JoinHandle<()>) -> Self {
        Self {
            browser: Arc::new(browser),
            events: Mutex::new(Some(events)),
        }
    }

    async fn dispose_context(browser: &Browser, context_id: BrowserContextId) {
        if let Err(err) = browser
            .execute(DisposeBrowserContextParams::new(context_id))
            .await
        {
            debug!(%err, "failed to dispose browser context");
        }
    }
}

impl BrowserSession for CdpSession {
    type Target = CdpTarget;

    async fn ping(&self) -> Result<(), TransportError> {
        let version = self.browser.version().await?;
        debug!(product = %version.product, "browser answered");
        Ok(())
    }

    async fn open_target(&self) -> Result<CdpTarget, TransportError> {
        let context_id = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await?
            .result
            .browser_context_id;

        let params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(TransportError::Protocol)?;

        match self.browser.new_page(params).await {
            Ok(page) => Ok(CdpTarget {
                page,
                context_id,
                browser: Arc::clone(&self.browser),
            }),
            Err(err) => {
                Self::dispose_context(&self.browser, context_id).await;
                Err(err.into())
            }
        }
    }

    async fn shutdown(&self) {
        // The connection drops as the process exits, so an error here is expected.
        if let Err(err) = self.browser.execute(CloseParams::default()).await {
            debug!(%err, "browser close returned an error");
        }
        let events = match self.events.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(events) = events {
            events.abort();
        }
    }
}

/// A page living in its own browser context.
pub struct CdpTarget {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<Browser>,
}

fn decode(data: &str) -> Result<Vec<u8>, TransportError> {
    STANDARD
        .decode(data)
        .map_err(|e| TransportError::protocol(format!("invalid base64 capture payload: {e}")))
}

impl RenderTarget for CdpTarget {
    async fn set_viewport(&self, viewport: Viewport, scale: f64) -> Result<(), TransportError> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                scale,
                false,
            ))
            .await?;
        Ok(())
    }

    async fn load_document(&self, html: &str) -> Result<(), TransportError> {
        self.page.goto("about:blank").await?;
        let frame_id = self
            .page
            .mainframe()
            .await?
            .ok_or_else(|| TransportError::protocol("page has no main frame"))?;
        self.page
            .execute(SetDocumentContentParams::new(frame_id, html))
            .await?;
        Ok(())
    }

    async fn evaluate(&self, expression: &str) -> Result<Value, TransportError> {
        let wrapped = format!("JSON.stringify(({expression}) ?? null)");
        let json: String = self
            .page
            .evaluate(wrapped)
            .await?
            .into_value()
            .map_err(|e| TransportError::protocol(format!("unexpected evaluation result: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| TransportError::protocol(format!("evaluation result is not JSON: {e}")))
    }

    async fn capture_png(&self, clip: BoundingRect) -> Result<Vec<u8>, TransportError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .clip(ClipRect {
                x: clip.x,
                y: clip.y,
                width: clip.width,
                height: clip.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true)
            .build();
        let response = self.page.execute(params).await?;
        decode(response.result.data.as_ref())
    }

    async fn print_pdf(&self, layout: PrintLayout) -> Result<Vec<u8>, TransportError> {
        let mut builder = PrintToPdfParams::builder().print_background(true);
        if let Some(paper) = layout.paper {
            builder = builder
                .page_ranges("1-1")
                .paper_width(paper.width)
                .paper_height(paper.height)
                .margin_top(0.0)
                .margin_bottom(0.0)
                .margin_left(0.0)
                .margin_right(0.0);
        }
        let response = self.page.execute(builder.build()).await?;
        decode(response.result.data.as_ref())
    }

    async fn set_transparent_background(&self, transparent: bool) -> Result<(), TransportError> {
        let params = if transparent {
            SetDefaultBackgroundColorOverrideParams {
                color: Some(Rgba {
                    r: 0,
                    g: 0,
                    b: 0,
                    a: Some(0.0),
                }),
            }
        } else {
            SetDefaultBackgroundColorOverrideParams::default()
        };
        self.page.execute(params).await?;
        Ok(())
    }

    async fn close(self) {
        let CdpTarget {
            page,
            context_id,
            browser,
        } = self;
        if let Err(err) = page.close().await {
            debug!(%err, "failed to close page");
        }
        CdpSession::dispose_context(&browser, context_id).await;
    }
}
