//! Device-pixel geometry of the rendered diagram.

use serde::{Deserialize, Serialize};

/// CSS pixels per inch used by the print pipeline.
pub const CSS_PIXELS_PER_INCH: f64 = 96.0;

/// Bounding box of the rendered SVG within the page.
///
/// The origin is floored and the size ceiled when measured in the page, so
/// anti-aliased edges are never clipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingRect {
    /// Snaps a raw client rect outward to whole pixels.
    pub fn snapped(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x: x.floor(),
            y: y.floor(),
            width: width.ceil(),
            height: height.ceil(),
        }
    }
}

/// Explicit paper dimensions for a print capture, in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaperSize {
    pub width: f64,
    pub height: f64,
}

impl PaperSize {
    /// Paper that fits the diagram plus the page offset on both sides.
    pub fn fitting(rect: &BoundingRect) -> Self {
        Self {
            width: (rect.width.ceil() + rect.x * 2.0) / CSS_PIXELS_PER_INCH,
            height: (rect.height.ceil() + rect.y * 2.0) / CSS_PIXELS_PER_INCH,
        }
    }
}

/// Layout of a print capture.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PrintLayout {
    /// `None` keeps the browser's default paper size and margins.
    pub paper: Option<PaperSize>,
}
