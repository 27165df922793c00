use std::io::{self, IsTerminal};
use std::process::ExitCode;

use mmd_lib::{ErrorCategory, ErrorPayload, RenderError};

/// Exit code for content errors: the diagram itself was rejected.
pub const EXIT_DIAGRAM: u8 = 1;
/// Exit code for every other failure.
pub const EXIT_FAILURE: u8 = 2;

pub fn exit_code(err: &RenderError) -> u8 {
    match err.to_payload().category {
        ErrorCategory::Diagram => EXIT_DIAGRAM,
        _ => EXIT_FAILURE,
    }
}

/// Render an error to stderr and return the appropriate exit code.
pub fn render_error(err: &RenderError) -> ExitCode {
    let colorize = io::stderr().is_terminal();
    eprintln!("{}", format_error(&err.to_payload(), colorize));
    ExitCode::from(exit_code(err))
}

pub fn format_error(payload: &ErrorPayload, colorize: bool) -> String {
    let label = match payload.category {
        ErrorCategory::Config => "config",
        ErrorCategory::Browser => "browser",
        ErrorCategory::Diagram => "diagram",
        ErrorCategory::Internal => "internal",
    };
    let mut out = format!("Error ({label}): {}", payload.message);
    if let Some(hint) = &payload.remediation {
        out.push_str("\nHint: ");
        out.push_str(hint);
    }
    if colorize {
        format!("\x1b[31m{out}\x1b[0m")
    } else {
        out
    }
}
