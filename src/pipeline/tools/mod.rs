pub mod external;

pub use external::*;

use std::path::Path;

use thiserror::Error;

use crate::models::PageSpan;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("No command configured for {0}")]
    NotConfigured(&'static str),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("Tool run cancelled")]
    Cancelled,

    #[error("{program} exited with code {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected tool output: {0}")]
    InvalidOutput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces a searchable PDF from a scanned one.
pub trait OcrEngine {
    fn ocr(&self, input: &Path, output: &Path) -> Result<(), ToolError>;
}

/// Pulls the text layer out of a PDF, optionally only a page range.
pub trait TextExtractor {
    fn extract_text(&self, pdf: &Path, pages: Option<PageSpan>) -> Result<String, ToolError>;
}

pub trait PageCounter {
    fn page_count(&self, pdf: &Path) -> Result<u32, ToolError>;
}

/// Page-range argument in the `start-end` form the text extractor takes.
pub fn page_argument(span: PageSpan) -> String {
    format!("{}-{}", span[0], span[1])
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Scripted stand-ins for the external tools.

    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::*;

    /// Writes a copy of the input, or fails for inputs in `fail`.
    #[derive(Default)]
    pub struct FakeOcr {
        pub fail: Vec<String>,
        pub calls: RefCell<Vec<PathBuf>>,
    }

    impl OcrEngine for FakeOcr {
        fn ocr(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
            self.calls.borrow_mut().push(input.to_path_buf());
            let name = input.to_string_lossy();
            if self.fail.iter().any(|f| name.ends_with(f.as_str())) {
                return Err(ToolError::NonZeroExit {
                    program: "fake-ocr".into(),
                    code: Some(2),
                    stderr: "scripted failure".into(),
                });
            }
            std::fs::copy(input, output)?;
            Ok(())
        }
    }

    /// Returns fixed text per file name; unknown files fail.
    #[derive(Default)]
    pub struct FakeText {
        pub texts: HashMap<String, String>,
        pub calls: RefCell<Vec<(PathBuf, Option<PageSpan>)>>,
    }

    impl TextExtractor for FakeText {
        fn extract_text(&self, pdf: &Path, pages: Option<PageSpan>) -> Result<String, ToolError> {
            self.calls.borrow_mut().push((pdf.to_path_buf(), pages));
            let name = pdf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.texts.get(&name).cloned().ok_or(ToolError::NonZeroExit {
                program: "fake-text".into(),
                code: Some(1),
                stderr: format!("no text for {name}"),
            })
        }
    }

    /// Page counts per file name.
    #[derive(Default)]
    pub struct FakePages {
        pub pages: HashMap<String, u32>,
    }

    impl PageCounter for FakePages {
        fn page_count(&self, pdf: &Path) -> Result<u32, ToolError> {
            let name = pdf
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.pages
                .get(&name)
                .copied()
                .ok_or_else(|| ToolError::InvalidOutput(format!("no page count for {name}")))
        }
    }
}
