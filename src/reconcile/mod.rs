//! Status reconciliation.
//!
//! Keeps each document's status in step with its artifacts and merges.
//! The decision itself is a pure function ([`decide_document_status`]); the
//! engine loads the inputs, applies the decision and cascades merge
//! completion, one immediate transaction per entry point.

pub mod decision;
pub mod engine;

pub use decision::*;
pub use engine::*;

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Merge {merge_id} links items from {} agencies", agencies.len())]
    CrossAgencyMerge { merge_id: Uuid, agencies: Vec<Uuid> },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: Uuid },
}

impl From<rusqlite::Error> for ReconcileError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
