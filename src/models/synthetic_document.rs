use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file we produced ourselves, typically a merge of several installments
/// into one normalized CSV. Linked to the documents and artifacts it was
/// built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticDocument {
    pub id: Uuid,
    pub file: Option<String>,
    /// When set, everything linked to this merge counts as complete.
    pub completed: bool,
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

impl SyntheticDocument {
    pub fn new(file: Option<String>) -> Self {
        let now = chrono::Local::now().naive_local();
        Self {
            id: Uuid::new_v4(),
            file,
            completed: false,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
        }
    }
}

/// A merge together with what it links to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeLinks {
    pub document_ids: Vec<Uuid>,
    pub processed_document_ids: Vec<Uuid>,
}

impl MergeLinks {
    pub fn is_empty(&self) -> bool {
        self.document_ids.is_empty() && self.processed_document_ids.is_empty()
    }
}
