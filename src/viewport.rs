use serde::{Deserialize, Serialize};

use crate::geometry::BoundingRect;

/// Page size in CSS pixels, before the device scale factor is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
        }
    }
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Smallest viewport whose visible area reaches the far corner of `rect`.
    pub fn covering(rect: &BoundingRect) -> Self {
        let width = (rect.x + rect.width).ceil().max(1.0) as u32;
        let height = (rect.y + rect.height).ceil().max(1.0) as u32;
        Self { width, height }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
