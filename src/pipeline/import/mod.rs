pub mod grouping;
pub mod importer;
pub mod new_files;
pub mod parent;
pub mod paths;
pub mod resolve;
pub mod scan;

pub use grouping::*;
pub use importer::*;
pub use new_files::*;
pub use parent::*;
pub use paths::*;
pub use resolve::*;
pub use scan::*;

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::reconcile::ReconcileError;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),
}

impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}
