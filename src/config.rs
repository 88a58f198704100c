use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::import::{IgnoreRules, ScanOptions};
use crate::pipeline::tools::{CancelFlag, ExternalTool, ToolError};

/// Application-level constants
pub const APP_NAME: &str = "pubrec";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Top directory of every stored agency file.
pub const STORAGE_ROOT: &str = "agency_attachments";

pub const SETTINGS_FILE: &str = "pubrec.toml";

/// Per-user data directory. Falls back to the working directory on systems
/// without a data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub fn default_database_path() -> PathBuf {
    app_data_dir().join("pubrec.db")
}

/// Used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,pubrec_lib=debug"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Runtime settings, read from TOML. Every field has a default so a partial
/// file (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub database_path: PathBuf,
    /// Directory holding `agency_attachments/`.
    pub media_root: PathBuf,
    /// OCR command line; `{input}` and `{output}` are substituted.
    pub ocr_command: Vec<String>,
    /// PDF-to-text command line; text is read from stdout. `{pages}`
    /// becomes a `start-end` range or is dropped.
    pub text_command: Vec<String>,
    /// Page-count command line; prints a number or `Pages: N`.
    pub page_count_command: Vec<String>,
    pub tool_timeout_secs: u64,
    /// Folder of externally OCR'd files consulted before running OCR.
    pub pre_ocr_dir: Option<PathBuf>,
    pub ignore: IgnoreRules,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            media_root: PathBuf::from("media"),
            ocr_command: [
                "ocrmypdf",
                "--threshold",
                "--remove-background",
                "--force-ocr",
                "--clean-final",
                "--oversample",
                "600",
                "{input}",
                "{output}",
            ]
            .map(String::from)
            .to_vec(),
            text_command: ["pdftotext", "-layout", "{input}", "-"]
                .map(String::from)
                .to_vec(),
            page_count_command: ["pdfinfo", "{input}"].map(String::from).to_vec(),
            tool_timeout_secs: 600,
            pre_ocr_dir: None,
            ignore: IgnoreRules::default(),
        }
    }
}

impl Settings {
    /// Load from `path`. A missing file yields the defaults; a malformed
    /// one is an error rather than being silently replaced.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `PUBREC_DATABASE` and `PUBREC_MEDIA_ROOT` when set.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(path) = std::env::var("PUBREC_DATABASE") {
            if !path.is_empty() {
                self.database_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("PUBREC_MEDIA_ROOT") {
            if !path.is_empty() {
                self.media_root = PathBuf::from(path);
            }
        }
        self
    }

    /// The scanned tree: `<media_root>/agency_attachments`.
    pub fn attachments_root(&self) -> PathBuf {
        self.media_root.join(STORAGE_ROOT)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            rules: self.ignore.clone(),
            ..Default::default()
        }
    }

    pub fn ocr_tool(&self, cancel: &CancelFlag) -> Result<ExternalTool, ToolError> {
        Ok(ExternalTool::new("ocr", &self.ocr_command, self.tool_timeout())?.with_cancel(cancel.clone()))
    }

    pub fn text_tool(&self, cancel: &CancelFlag) -> Result<ExternalTool, ToolError> {
        Ok(ExternalTool::new("pdf-to-text", &self.text_command, self.tool_timeout())?
            .with_cancel(cancel.clone()))
    }

    pub fn page_count_tool(&self, cancel: &CancelFlag) -> Result<ExternalTool, ToolError> {
        Ok(
            ExternalTool::new("page-count", &self.page_count_command, self.tool_timeout())?
                .with_cancel(cancel.clone()),
        )
    }
}
