//! One configured installation: settings, the database they point at and
//! the cancel flag shared by every tool run. Tooling front-ends call these
//! methods instead of wiring the pipeline pieces together themselves.

use rusqlite::Connection;
use thiserror::Error;

use crate::config::{ConfigError, Settings};
use crate::db::{repository, sqlite, DatabaseError};
use crate::models::ProcessedDocument;
use crate::pipeline::autoextract::{self, AutoExtractOptions, RevertReport};
use crate::pipeline::batch::{AgencyScope, BatchError, BatchReport};
use crate::pipeline::import::{self, ImportError, ImportReport, ImportStrategy, NewFileReport};
use crate::pipeline::ocr::{self, OcrOptions};
use crate::pipeline::segment::{self, SegmentOptions};
use crate::pipeline::tools::{CancelFlag, ToolError};

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Workspace {
    settings: Settings,
    cancel: CancelFlag,
}

impl Workspace {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            cancel: CancelFlag::new(),
        }
    }

    /// Load settings from a TOML file plus environment overrides.
    pub fn from_settings_file(path: &std::path::Path) -> Result<Self, WorkspaceError> {
        Ok(Self::new(Settings::load(path)?.with_env_overrides()))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Raise to stop running batches after the current file.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Open (creating if needed) the configured database.
    pub fn open_db(&self) -> Result<Connection, WorkspaceError> {
        if let Some(dir) = self.settings.database_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(sqlite::open_database(&self.settings.database_path)?)
    }

    pub fn import_all(&self, conn: &Connection) -> Result<ImportReport, WorkspaceError> {
        Ok(import::import_tree(
            conn,
            &self.settings.attachments_root(),
            &self.settings.scan_options(),
        )?)
    }

    pub fn import_new(
        &self,
        conn: &Connection,
        strategy: &mut dyn ImportStrategy,
    ) -> Result<NewFileReport, WorkspaceError> {
        Ok(import::import_new_files(
            conn,
            &self.settings.attachments_root(),
            &self.settings.scan_options(),
            strategy,
        )?)
    }

    pub fn run_ocr(&self, conn: &Connection) -> Result<BatchReport, WorkspaceError> {
        let engine = self.settings.ocr_tool(&self.cancel)?;
        let options = OcrOptions {
            media_root: self.settings.media_root.clone(),
            pre_ocr_dir: self.settings.pre_ocr_dir.clone(),
            cancel: self.cancel.clone(),
        };
        Ok(ocr::run_ocr_batch(conn, &engine, &options)?)
    }

    pub fn run_autoextract(&self, conn: &Connection) -> Result<BatchReport, WorkspaceError> {
        let extractor = self.settings.text_tool(&self.cancel)?;
        let options = AutoExtractOptions {
            media_root: self.settings.media_root.clone(),
            cancel: self.cancel.clone(),
        };
        Ok(autoextract::run_autoextract_batch(conn, &extractor, &options)?)
    }

    pub fn revert_autoextract(
        &self,
        conn: &Connection,
        scope: &AgencyScope,
        dry_run: bool,
    ) -> Result<RevertReport, WorkspaceError> {
        Ok(autoextract::revert_autoextraction(
            conn,
            &self.settings.media_root,
            scope,
            dry_run,
        )?)
    }

    pub fn segmentable(
        &self,
        conn: &Connection,
    ) -> Result<(Vec<ProcessedDocument>, BatchReport), WorkspaceError> {
        let counter = self.settings.page_count_tool(&self.cancel)?;
        let options = SegmentOptions {
            media_root: self.settings.media_root.clone(),
            cancel: self.cancel.clone(),
        };
        Ok(segment::segmentable_artifacts(conn, &counter, &options)?)
    }

    pub fn check_consistency(&self, conn: &Connection) -> Result<repository::ConsistencyReport, WorkspaceError> {
        Ok(repository::check_consistency(conn)?)
    }
}
