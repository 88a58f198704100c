use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;
use crate::reconcile::{decide_document_status, StatusDecision};

use super::{
    documents_with_file_prefix, has_completed_merge, list_agencies, list_documents,
    list_for_document, orphaned_artifacts,
};

/// Processed output that should never be stored as a responsive document.
const MISFILED_SUFFIX: &str = ".csv";

/// Files from the pre-cleaning step; deliberately stored as documents.
const PRECLEANED_MARKER: &str = ".precleaned";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsistencyIssue {
    /// Stored status differs from what reconciliation would produce.
    StatusDrift {
        document_id: Uuid,
        file: String,
        stored: Status,
        expected: Status,
    },
    /// Artifact whose parent document is gone.
    OrphanedArtifact { artifact_id: Uuid, file: String },
    /// A processed file stored as a responsive document. `candidates` are the
    /// documents it most likely derives from.
    MisfiledDocument {
        document_id: Uuid,
        file: String,
        candidates: Vec<Uuid>,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsistencyReport {
    pub issues: Vec<ConsistencyIssue>,
    pub documents_checked: usize,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Scan the database for state the engine would not have produced.
///
/// Detects:
/// - Documents whose stored status drifts from recomputation
/// - Artifacts detached from any document
/// - CSV files stored as responsive documents (agencies marked complete and
///   pre-cleaned files are skipped)
pub fn check_consistency(conn: &Connection) -> Result<ConsistencyReport, DatabaseError> {
    let mut report = ConsistencyReport::default();

    let documents = list_documents(conn, &DocumentFilter::default())?;
    report.documents_checked = documents.len();
    for doc in &documents {
        let artifacts = list_for_document(conn, &doc.id)?;
        let merged = has_completed_merge(conn, &doc.id)?;
        if let StatusDecision::Set(expected) = decide_document_status(doc, &artifacts, merged) {
            report.issues.push(ConsistencyIssue::StatusDrift {
                document_id: doc.id,
                file: doc.file.clone(),
                stored: doc.status,
                expected,
            });
        }
    }

    for pdoc in orphaned_artifacts(conn)? {
        report.issues.push(ConsistencyIssue::OrphanedArtifact {
            artifact_id: pdoc.id,
            file: pdoc.file,
        });
    }

    for agency in list_agencies(conn)? {
        if agency.completed {
            continue;
        }
        let misfiled = list_documents(
            conn,
            &DocumentFilter {
                agency_id: Some(agency.id),
                file_suffix: Some(MISFILED_SUFFIX.to_string()),
                ..Default::default()
            },
        )?;
        for doc in misfiled {
            if doc.file.contains(PRECLEANED_MARKER) {
                continue;
            }
            let candidates = documents_with_file_prefix(conn, &agency.id, path_stem(&doc.file))?
                .into_iter()
                .filter(|candidate| candidate.id != doc.id)
                .map(|candidate| candidate.id)
                .collect();
            report.issues.push(ConsistencyIssue::MisfiledDocument {
                document_id: doc.id,
                file: doc.file,
                candidates,
            });
        }
    }

    if report.is_clean() {
        tracing::debug!(documents = report.documents_checked, "Consistency check clean");
    } else {
        tracing::warn!(
            documents = report.documents_checked,
            issues = report.issues.len(),
            "Consistency check found issues"
        );
    }
    Ok(report)
}

/// Path up to the first dot of the file name.
fn path_stem(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].find('.') {
        Some(dot) => &path[..name_start + dot],
        None => path,
    }
}
