//! Artifact extraction from a completed render.

use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::browser::{RenderTarget, TransportError};
use crate::geometry::{BoundingRect, PaperSize, PrintLayout};
use crate::options::{OutputKind, RenderOptions};
use crate::{RenderError, Result, Viewport};

/// Pause after resizing the viewport so layout settles before capture.
const SETTLE_DELAY: Duration = Duration::from_millis(100);

pub(crate) const MEASURE_SCRIPT: &str = r#"(() => {
  const svg = document.querySelector('#container svg');
  if (!svg) return null;
  const rect = svg.getBoundingClientRect();
  return { x: rect.left, y: rect.top, width: rect.width, height: rect.height };
})()"#;

/// Serializes the SVG root; with `fit`, first sizes it to its `viewBox`.
pub(crate) fn svg_script(fit: bool) -> String {
    format!(
        r#"(() => {{
  const svg = document.querySelector('#container svg');
  if (!svg) return null;
  if ({fit}) {{
    const parts = (svg.getAttribute('viewBox') || '').trim().split(/[\s,]+/);
    if (parts.length === 4) {{
      svg.setAttribute('width', parts[2]);
      svg.setAttribute('height', parts[3]);
      svg.style.removeProperty('max-width');
    }}
  }}
  return new XMLSerializer().serializeToString(svg);
}})()"#
    )
}

#[derive(Debug, Deserialize)]
struct ClientRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Produces the artifact bytes for `kind`.
pub async fn extract<T: RenderTarget>(
    target: &T,
    kind: OutputKind,
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    debug!(%kind, "extracting artifact");
    match kind {
        OutputKind::Svg => extract_svg(target, options.svg_fit).await,
        OutputKind::Png => capture_png(target, options).await,
        OutputKind::Pdf => print_pdf(target, options).await,
    }
}

pub async fn extract_svg<T: RenderTarget>(target: &T, fit: bool) -> Result<Vec<u8>> {
    let value = target
        .evaluate(&svg_script(fit))
        .await
        .map_err(RenderError::Capture)?;
    let markup: Option<String> = serde_json::from_value(value)?;
    match markup {
        Some(markup) if !markup.is_empty() => Ok(markup.into_bytes()),
        _ => Err(RenderError::NoVectorElement),
    }
}

/// Bounding rectangle of the SVG root, snapped outward to whole pixels.
pub async fn measure_svg<T: RenderTarget>(target: &T) -> Result<BoundingRect> {
    let value = target
        .evaluate(MEASURE_SCRIPT)
        .await
        .map_err(RenderError::Capture)?;
    let rect: Option<ClientRect> = serde_json::from_value(value)?;
    let rect = rect.ok_or(RenderError::BoundsUnavailable)?;
    Ok(BoundingRect::snapped(rect.x, rect.y, rect.width, rect.height))
}

pub async fn capture_png<T: RenderTarget>(target: &T, options: &RenderOptions) -> Result<Vec<u8>> {
    let rect = measure_svg(target).await?;
    let viewport = Viewport::covering(&rect);
    debug!(%viewport, scale = options.scale, "resizing viewport for capture");
    target
        .set_viewport(viewport, options.scale)
        .await
        .map_err(RenderError::Capture)?;
    tokio::time::sleep(SETTLE_DELAY).await;

    with_background(
        target,
        options.background_color.is_transparent(),
        target.capture_png(rect),
    )
    .await
}

pub async fn print_pdf<T: RenderTarget>(target: &T, options: &RenderOptions) -> Result<Vec<u8>> {
    let layout = if options.pdf_fit {
        let rect = measure_svg(target).await?;
        let paper = PaperSize::fitting(&rect);
        debug!(width_in = paper.width, height_in = paper.height, "fitting paper to diagram");
        PrintLayout { paper: Some(paper) }
    } else {
        PrintLayout::default()
    };

    with_background(
        target,
        options.background_color.is_transparent(),
        target.print_pdf(layout),
    )
    .await
}

/// Runs `capture` with the default background overridden to transparent when
/// requested, restoring the default afterwards whatever the capture's outcome.
async fn with_background<T, F>(target: &T, transparent: bool, capture: F) -> Result<Vec<u8>>
where
    T: RenderTarget,
    F: Future<Output = std::result::Result<Vec<u8>, TransportError>>,
{
    if !transparent {
        return capture.await.map_err(RenderError::Capture);
    }

    target
        .set_transparent_background(true)
        .await
        .map_err(RenderError::Capture)?;
    let captured = capture.await;
    if let Err(err) = target.set_transparent_background(false).await {
        debug!(%err, "failed to restore default background");
    }
    captured.map_err(RenderError::Capture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::fake::{Call, FakeTarget, FAKE_PDF, FAKE_PNG, FAKE_SVG};
    use crate::options::BackgroundColor;

    fn transparent() -> RenderOptions {
        RenderOptions {
            background_color: BackgroundColor::Transparent,
            ..RenderOptions::default()
        }
    }

    #[test]
    fn svg_script_only_fits_when_asked() {
        assert!(svg_script(true).contains("if (true)"));
        assert!(svg_script(false).contains("if (false)"));
        assert!(svg_script(false).contains("XMLSerializer"));
    }

    #[tokio::test]
    async fn svg_is_serialized_markup() {
        let target = FakeTarget::default();
        let bytes = extract(&target, OutputKind::Svg, &RenderOptions::default())
            .await
            .expect("svg");
        assert_eq!(bytes, FAKE_SVG.as_bytes());
    }

    #[tokio::test]
    async fn missing_svg_is_internal_error() {
        let target = FakeTarget::default().with_svg(None);
        let err = extract_svg(&target, false).await.expect_err("no svg");
        assert!(matches!(err, RenderError::NoVectorElement));
    }

    #[tokio::test]
    async fn png_resizes_to_cover_bounds_and_clips() {
        let target = FakeTarget::default().with_bounds(Some(BoundingRect {
            x: 8.0,
            y: 8.0,
            width: 300.4,
            height: 174.2,
        }));
        let options = RenderOptions {
            scale: 2.0,
            ..RenderOptions::default()
        };
        let bytes = capture_png(&target, &options).await.expect("png");
        assert_eq!(bytes, FAKE_PNG);

        let calls = target.calls();
        let clip = BoundingRect {
            x: 8.0,
            y: 8.0,
            width: 301.0,
            height: 175.0,
        };
        assert!(calls.contains(&Call::SetViewport(Viewport::new(309, 183), 2.0)));
        assert_eq!(calls.last(), Some(&Call::CapturePng(clip)));
        assert!(!calls.iter().any(|c| matches!(c, Call::Background(_))));
    }

    #[tokio::test]
    async fn transparent_png_overrides_and_restores_background() {
        let target = FakeTarget::default();
        capture_png(&target, &transparent()).await.expect("png");

        let calls = target.calls();
        let n = calls.len();
        assert_eq!(calls[n - 3], Call::Background(true));
        assert!(matches!(calls[n - 2], Call::CapturePng(_)));
        assert_eq!(calls[n - 1], Call::Background(false));
    }

    #[tokio::test]
    async fn background_restored_when_capture_fails() {
        let target = FakeTarget::default().failing_on("capture_png");
        let err = capture_png(&target, &transparent())
            .await
            .expect_err("capture fails");
        assert!(matches!(err, RenderError::Capture(_)));
        assert_eq!(target.calls().last(), Some(&Call::Background(false)));
    }

    #[tokio::test]
    async fn png_without_bounds_is_bounds_error() {
        let target = FakeTarget::default().with_bounds(None);
        let err = capture_png(&target, &RenderOptions::default())
            .await
            .expect_err("no bounds");
        assert!(matches!(err, RenderError::BoundsUnavailable));
    }

    #[tokio::test]
    async fn pdf_uses_default_paper_unless_fitting() {
        let target = FakeTarget::default();
        let bytes = print_pdf(&target, &RenderOptions::default())
            .await
            .expect("pdf");
        assert_eq!(bytes, FAKE_PDF);
        assert_eq!(
            target.calls().last(),
            Some(&Call::PrintPdf(PrintLayout::default()))
        );
    }

    #[tokio::test]
    async fn pdf_fit_sizes_paper_from_bounds() {
        let target = FakeTarget::default();
        let options = RenderOptions {
            pdf_fit: true,
            ..RenderOptions::default()
        };
        print_pdf(&target, &options).await.expect("pdf");

        let expected = PaperSize {
            width: 316.0 / 96.0,
            height: 191.0 / 96.0,
        };
        assert_eq!(
            target.calls().last(),
            Some(&Call::PrintPdf(PrintLayout {
                paper: Some(expected)
            }))
        );
    }

    #[tokio::test]
    async fn transparent_pdf_overrides_and_restores_background() {
        let target = FakeTarget::default();
        let bytes = print_pdf(&target, &transparent()).await.expect("pdf");
        assert_eq!(bytes, FAKE_PDF);

        let calls = target.calls();
        assert_eq!(
            calls,
            vec![
                Call::Background(true),
                Call::PrintPdf(PrintLayout::default()),
                Call::Background(false),
            ]
        );
    }

    #[tokio::test]
    async fn background_restored_when_print_fails() {
        let target = FakeTarget::default().failing_on("print_pdf");
        let err = print_pdf(&target, &transparent())
            .await
            .expect_err("print fails");
        assert!(matches!(err, RenderError::Capture(_)));

        let calls = target.calls();
        assert_eq!(calls.first(), Some(&Call::Background(true)));
        assert_eq!(calls.last(), Some(&Call::Background(false)));
    }

    #[tokio::test]
    async fn transport_failure_is_capture_error() {
        let target = FakeTarget::default().failing_on("print_pdf");
        let err = print_pdf(&target, &RenderOptions::default())
            .await
            .expect_err("print fails");
        assert!(matches!(err, RenderError::Capture(_)));
        assert!(err.is_retryable());
    }
}
