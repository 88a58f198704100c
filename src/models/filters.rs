use uuid::Uuid;

use super::enums::Status;

#[derive(Debug, Default, Clone)]
pub struct DocumentFilter {
    pub agency_id: Option<Uuid>,
    /// Match any of these statuses; empty matches all.
    pub statuses: Vec<Status>,
    pub file_suffix: Option<String>,
    /// Exclude files ending with this suffix.
    pub exclude_file_suffix: Option<String>,
    pub no_new_records: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct ProcessedDocumentFilter {
    pub document_id: Option<Uuid>,
    pub agency_id: Option<Uuid>,
    pub status: Option<Status>,
    pub file_suffix: Option<String>,
    /// Match on the parent document's status; empty matches all.
    pub document_statuses: Vec<Status>,
}
