//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a `&Connection` (or a transaction, which derefs to
//! one) and leaves transaction boundaries to the caller.

mod agency;
mod consistency;
mod document;
mod field_category;
mod processed_document;
mod synthetic_document;

use chrono::NaiveDateTime;
use uuid::Uuid;

use super::DatabaseError;

pub use agency::*;
pub use consistency::*;
pub use document::*;
pub use field_category::*;
pub use processed_document::*;
pub use synthetic_document::*;

pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_optional_uuid(value: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    value.as_deref().map(parse_uuid).transpose()
}

/// LIKE pattern matching values that end with `suffix` (use with `ESCAPE '\'`).
pub(crate) fn like_suffix(suffix: &str) -> String {
    format!("%{}", escape_like(suffix))
}

/// LIKE pattern matching values that start with `prefix` (use with `ESCAPE '\'`).
pub(crate) fn like_prefix(prefix: &str) -> String {
    format!("{}%", escape_like(prefix))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
