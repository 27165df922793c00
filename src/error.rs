use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::browser::TransportError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to launch browser: {0}")]
    Launch(#[source] TransportError),

    #[error("Failed to serialize diagram configuration: {0}")]
    ConfigSerialization(#[source] serde_json::Error),

    #[error("{}", timeout_message(.waited, .record, .diagram_error))]
    RenderTimeout {
        waited: Duration,
        /// Raw completion record found on the page when the wait expired.
        record: Option<String>,
        /// Library error message, when the record reported a failure.
        diagram_error: Option<String>,
    },

    #[error("Diagram rendering error: {0}")]
    DiagramRender(String),

    #[error("No SVG element found in rendered output")]
    NoVectorElement,

    #[error("Unable to compute SVG bounds: no SVG element found in rendered output")]
    BoundsUnavailable,

    #[error("Capture failed: {0}")]
    Capture(#[source] TransportError),

    #[error("Browser navigation failed: {0}")]
    Navigation(#[source] TransportError),

    #[error("Render cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn timeout_message(
    waited: &Duration,
    record: &Option<String>,
    diagram_error: &Option<String>,
) -> String {
    let mut message = format!(
        "Diagram rendering timed out after {:?} waiting for SVG",
        waited
    );
    if let Some(error) = diagram_error {
        message.push_str(&format!(" (diagram error: {error})"));
    }
    message.push_str(&format!(
        "\nrender result: {}",
        record.as_deref().unwrap_or("{}")
    ));
    message
}

impl RenderError {
    pub fn config(message: impl Into<String>) -> Self {
        RenderError::Config(message.into())
    }

    pub fn diagram(message: impl Into<String>) -> Self {
        RenderError::DiagramRender(message.into())
    }

    /// Whether rerunning the whole call with a fresh browsing context may succeed.
    ///
    /// Content errors never are; a timeout only is when the page did not already
    /// report a diagram failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            RenderError::Navigation(_) | RenderError::Capture(_) => true,
            RenderError::RenderTimeout { diagram_error, .. } => diagram_error.is_none(),
            _ => false,
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            RenderError::Launch(_) => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "Check browser.executable_path in the config (or install Chrome/Chromium) and any extra browser args.",
            ),
            RenderError::ConfigSerialization(_) | RenderError::Config(_) => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Check flags and the config file (e.g., --width/--height must be positive, --library must point at mermaid.min.js).",
            ),
            RenderError::RenderTimeout { diagram_error, .. } => {
                if diagram_error.is_some() {
                    ErrorPayload::new(
                        ErrorCategory::Diagram,
                        self.to_string(),
                        "The diagram definition was rejected; fix the syntax reported above.",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Browser,
                        self.to_string(),
                        "The browser did not finish rendering; retry, or increase render.timeout in the config.",
                    )
                }
            }
            RenderError::DiagramRender(_) => ErrorPayload::new(
                ErrorCategory::Diagram,
                self.to_string(),
                "Check the diagram syntax and diagram type.",
            ),
            RenderError::NoVectorElement | RenderError::BoundsUnavailable => ErrorPayload::new(
                ErrorCategory::Internal,
                self.to_string(),
                "Render reported success without an SVG; please file an issue with the input.",
            ),
            RenderError::Capture(_) | RenderError::Navigation(_) => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "Transient browser failure; retry the render.",
            ),
            RenderError::Cancelled => ErrorPayload::new(
                ErrorCategory::Browser,
                self.to_string(),
                "The render was cancelled before it completed.",
            ),
            RenderError::Io(_) => ErrorPayload::new(
                ErrorCategory::Config,
                self.to_string(),
                "Check file paths/permissions.",
            ),
            RenderError::Serialization(_) => ErrorPayload::new(
                ErrorCategory::Internal,
                self.to_string(),
                "Run with --verbose for details.",
            ),
        }
    }
}

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Browser,
    Diagram,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}
