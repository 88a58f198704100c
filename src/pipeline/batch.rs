//! Shared plumbing for the file-processing batches: the per-run report,
//! the fatal error type and agency scoping.

use std::fmt::Display;

use rusqlite::Connection;
use serde::Serialize;
use thiserror::Error;

use crate::db::{repository, DatabaseError};
use crate::models::Agency;
use crate::pipeline::segment::SegmentError;
use crate::reconcile::ReconcileError;

/// Errors that abort a whole batch. Per-file tool failures never end up
/// here; they are collected in the [`BatchReport`].
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Invalid incident pages: {0}")]
    Segment(#[from] SegmentError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for BatchError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSkip {
    pub file: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub processed: Vec<String>,
    pub skipped: Vec<BatchSkip>,
    pub failures: Vec<BatchFailure>,
    /// The run stopped early on a cancel request.
    pub cancelled: bool,
}

impl BatchReport {
    pub fn done(&mut self, file: impl Into<String>) {
        self.processed.push(file.into());
    }

    pub fn skip(&mut self, file: impl Into<String>, reason: impl Into<String>) {
        let (file, reason) = (file.into(), reason.into());
        tracing::debug!(file = %file, reason = %reason, "Skipped");
        self.skipped.push(BatchSkip { file, reason });
    }

    pub fn fail(&mut self, file: impl Into<String>, error: impl Display) {
        let file = file.into();
        tracing::warn!(file = %file, error = %error, "Batch item failed");
        self.failures.push(BatchFailure {
            file,
            error: error.to_string(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    pub fn log_summary(&self, batch: &str) {
        tracing::info!(
            batch,
            processed = self.processed.len(),
            skipped = self.skipped.len(),
            failed = self.failures.len(),
            cancelled = self.cancelled,
            "Batch finished"
        );
    }
}

/// Which agencies a batch touches: one agency, or all but an ignore list.
#[derive(Debug, Clone, Default)]
pub struct AgencyScope {
    pub only: Option<String>,
    pub ignore: Vec<String>,
}

impl AgencyScope {
    pub fn includes(&self, name: &str) -> bool {
        self.only.as_deref().map_or(true, |only| only == name)
            && !self.ignore.iter().any(|i| i == name)
    }

    /// Parse a comma-separated ignore list, trimming blanks.
    pub fn with_ignore_list(mut self, list: &str) -> Self {
        self.ignore = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        self
    }

    pub fn agencies(&self, conn: &Connection) -> Result<Vec<Agency>, DatabaseError> {
        Ok(repository::list_agencies(conn)?
            .into_iter()
            .filter(|a| self.includes(&a.name))
            .collect())
    }
}

/// Swap the last extension of a storage path for a stage suffix, e.g.
/// `Kent/letter.pdf` + `.ocr.pdf` -> `Kent/letter.ocr.pdf`.
pub fn with_stage_suffix(path: &str, suffix: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem_end = path[name_start..]
        .rfind('.')
        .filter(|dot| *dot > 0)
        .map_or(path.len(), |dot| name_start + dot);
    format!("{}{suffix}", &path[..stem_end])
}
