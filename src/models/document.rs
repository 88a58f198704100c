use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Status;

/// An original file sent by an agency in response to a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    /// Detached (None) when the owning agency is deleted.
    pub agency_id: Option<Uuid>,
    /// Storage path, `agency_attachments/<agency>/...`.
    pub file: String,
    pub status: Status,
    /// Marks a response with nothing new in it. Forces `complete` and
    /// exempts the document from reconciliation.
    pub no_new_records: bool,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

impl Document {
    pub fn new(agency_id: Option<Uuid>, file: impl Into<String>) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: Uuid::new_v4(),
            agency_id,
            file: file.into(),
            status: Status::Unchecked,
            no_new_records: false,
            notes: None,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
        }
    }

    /// Whether artifact-driven recomputation must leave this document alone.
    pub fn is_frozen(&self) -> bool {
        self.no_new_records || self.status.is_sticky()
    }

    /// File name without the storage directories.
    pub fn file_name(&self) -> &str {
        self.file.rsplit('/').next().unwrap_or(&self.file)
    }
}
