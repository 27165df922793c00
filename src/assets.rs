//! Client-side scripts inlined into every generated page.

use std::fs;
use std::path::Path;

use crate::{RenderError, Result};

/// Script text of the diagram rendering library and an optional extension
/// library registering additional diagram types (e.g. ZenUML).
#[derive(Debug, Clone, Default)]
pub struct RendererAssets {
    pub library: String,
    pub extension: Option<String>,
}

impl RendererAssets {
    pub fn new(library: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            extension: None,
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Reads the library (and extension, if given) from disk.
    pub fn from_files(library: &Path, extension: Option<&Path>) -> Result<Self> {
        let library = read_script(library)?;
        let extension = extension.map(read_script).transpose()?;
        Ok(Self { library, extension })
    }
}

fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        RenderError::config(format!(
            "Failed to read script {}: {}. Hint: point assets.library at mermaid.min.js",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_library_and_extension() {
        let dir = TempDir::new().expect("tempdir");
        let lib = dir.path().join("mermaid.min.js");
        let ext = dir.path().join("mermaid-zenuml.js");
        fs::write(&lib, "window.mermaid = {};").expect("write lib");
        fs::write(&ext, "window['mermaid-zenuml'] = {};").expect("write ext");

        let assets = RendererAssets::from_files(&lib, Some(&ext)).expect("load");
        assert_eq!(assets.library, "window.mermaid = {};");
        assert_eq!(
            assets.extension.as_deref(),
            Some("window['mermaid-zenuml'] = {};")
        );
    }

    #[test]
    fn missing_library_is_config_error() {
        let err = RendererAssets::from_files(Path::new("/definitely/missing.js"), None)
            .expect_err("missing file");
        assert!(matches!(err, RenderError::Config(ref msg) if msg.contains("missing.js")));
    }
}
