use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Autocomplete value for a labelled field, with a usage counter for ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldCategory {
    pub id: Uuid,
    pub fieldname: String,
    pub value: String,
    pub count: i64,
}
