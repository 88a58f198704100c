use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Status;
use crate::status;

/// Inclusive, zero-indexed page range of one incident inside a PDF.
pub type PageSpan = [u32; 2];

/// A processed (derived) version of a single agency document: an OCR'd PDF,
/// an extracted CSV, a cleaned CSV and so on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub id: Uuid,
    /// Detached (None) when the parent document is deleted.
    pub document_id: Option<Uuid>,
    /// Storage path; unique across all artifacts.
    pub file: String,
    pub status: Status,
    /// Page(s) of the original PDF this artifact came from, e.g. "4-9".
    pub source_page: Option<String>,
    /// Sheet of the original spreadsheet this CSV was exported from.
    pub source_sheet: Option<String>,
    pub incident_pgs: Option<Vec<PageSpan>>,
    pub pages: Option<u32>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

impl ProcessedDocument {
    /// New artifact with its status taken from the filename.
    pub fn new(document_id: Option<Uuid>, file: impl Into<String>) -> Self {
        let file = file.into();
        let status = status::classify(&file);
        Self::with_status(document_id, file, status)
    }

    /// New artifact with an explicitly chosen status.
    pub fn with_status(document_id: Option<Uuid>, file: impl Into<String>, status: Status) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: Uuid::new_v4(),
            document_id,
            file: file.into(),
            status,
            source_page: None,
            source_sheet: None,
            incident_pgs: None,
            pages: None,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
        }
    }

    pub fn score(&self) -> usize {
        status::score(self.status)
    }
}
