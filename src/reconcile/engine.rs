use std::collections::BTreeSet;

use rusqlite::Connection;
use uuid::Uuid;

use super::decision::{decide_document_status, SkipReason, StatusDecision};
use super::ReconcileError;
use crate::db::{in_immediate, repository};
use crate::models::*;

// ---------------------------------------------------------------------------
// Save entry points
// ---------------------------------------------------------------------------

/// Insert or update a document, then reconcile it. `doc.status` is updated
/// in place with the reconciled value.
pub fn save_document(conn: &Connection, doc: &mut Document) -> Result<StatusDecision, ReconcileError> {
    in_immediate(conn, |conn| {
        if doc.no_new_records {
            doc.status = Status::Complete;
        }
        if repository::get_document(conn, &doc.id)?.is_some() {
            repository::update_document(conn, doc)?;
        } else {
            repository::insert_document(conn, doc)?;
        }
        let decision = reconcile_document(conn, &doc.id)?;
        if let Some(status) = decision.new_status() {
            doc.status = status;
        }
        Ok(decision)
    })
}

/// Insert or update an artifact, then reconcile its parent document.
pub fn save_processed_document(
    conn: &Connection,
    pdoc: &ProcessedDocument,
) -> Result<StatusDecision, ReconcileError> {
    in_immediate(conn, |conn| {
        if repository::get_processed_document(conn, &pdoc.id)?.is_some() {
            repository::update_processed_document(conn, pdoc)?;
        } else {
            repository::insert_processed_document(conn, pdoc)?;
        }
        reconcile_artifact(conn, pdoc)
    })
}

/// Insert or update a merge and add `links` to it. Links from more than one
/// agency are rejected before anything is written. Returns the documents
/// forced to complete.
pub fn save_merge(
    conn: &Connection,
    merge: &SyntheticDocument,
    links: &MergeLinks,
) -> Result<Vec<Uuid>, ReconcileError> {
    in_immediate(conn, |conn| {
        let exists = repository::get_synthetic_document(conn, &merge.id)?.is_some();

        let mut agencies = BTreeSet::new();
        if exists {
            agencies.extend(repository::merge_agencies(conn, &merge.id)?);
        }
        agencies.extend(link_agencies(conn, links)?);
        ensure_single_agency(merge.id, agencies)?;

        if exists {
            repository::update_synthetic_document(conn, merge)?;
        } else {
            repository::insert_synthetic_document(conn, merge)?;
        }
        for document_id in &links.document_ids {
            repository::link_document(conn, &merge.id, document_id)?;
        }
        for processed_id in &links.processed_document_ids {
            repository::link_processed(conn, &merge.id, processed_id)?;
        }
        propagate_merge(conn, merge)
    })
}

/// Force a document's status by hand, bypassing recomputation. Used when
/// tooling resets a stage.
pub fn override_document_status(
    conn: &Connection,
    document_id: &Uuid,
    status: Status,
) -> Result<(), ReconcileError> {
    in_immediate(conn, |conn| {
        let doc = load_document(conn, document_id)?;
        if doc.status != status {
            repository::update_document_status(conn, document_id, status)?;
            tracing::info!(
                document_id = %document_id,
                from = %doc.status,
                to = %status,
                "Document status overridden"
            );
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// Reconciliation hooks
// ---------------------------------------------------------------------------

/// Recompute the parent of an artifact that was just saved.
pub fn on_artifact_saved(conn: &Connection, artifact_id: &Uuid) -> Result<StatusDecision, ReconcileError> {
    in_immediate(conn, |conn| {
        let pdoc = repository::get_processed_document(conn, artifact_id)?.ok_or(
            ReconcileError::NotFound {
                entity_type: "ProcessedDocument",
                id: *artifact_id,
            },
        )?;
        reconcile_artifact(conn, &pdoc)
    })
}

/// Recompute a document from its artifacts and merges. Idempotent.
pub fn on_document_saved(conn: &Connection, document_id: &Uuid) -> Result<StatusDecision, ReconcileError> {
    in_immediate(conn, |conn| reconcile_document(conn, document_id))
}

/// Cascade a merge's completion onto every linked document and every linked
/// artifact's parent. Returns the documents forced to complete; a pending
/// merge forces nothing.
pub fn on_merge_saved(conn: &Connection, merge_id: &Uuid) -> Result<Vec<Uuid>, ReconcileError> {
    in_immediate(conn, |conn| {
        let merge = repository::get_synthetic_document(conn, merge_id)?.ok_or(
            ReconcileError::NotFound {
                entity_type: "SyntheticDocument",
                id: *merge_id,
            },
        )?;
        let agencies = repository::merge_agencies(conn, merge_id)?;
        ensure_single_agency(*merge_id, agencies)?;
        propagate_merge(conn, &merge)
    })
}

// ---------------------------------------------------------------------------
// Internals (no transaction handling)
// ---------------------------------------------------------------------------

fn load_document(conn: &Connection, id: &Uuid) -> Result<Document, ReconcileError> {
    repository::get_document(conn, id)?.ok_or(ReconcileError::NotFound {
        entity_type: "Document",
        id: *id,
    })
}

fn reconcile_artifact(
    conn: &Connection,
    pdoc: &ProcessedDocument,
) -> Result<StatusDecision, ReconcileError> {
    match pdoc.document_id {
        Some(document_id) => reconcile_document(conn, &document_id),
        None => {
            tracing::debug!(file = %pdoc.file, "Artifact has no parent, nothing to reconcile");
            Ok(StatusDecision::Skipped(SkipReason::Detached))
        }
    }
}

fn reconcile_document(conn: &Connection, document_id: &Uuid) -> Result<StatusDecision, ReconcileError> {
    let doc = load_document(conn, document_id)?;
    let artifacts = repository::list_for_document(conn, document_id)?;
    let merged = repository::has_completed_merge(conn, document_id)?;

    let decision = decide_document_status(&doc, &artifacts, merged);
    match decision {
        StatusDecision::Set(status) => {
            repository::update_document_status(conn, document_id, status)?;
            tracing::info!(
                document_id = %document_id,
                file = %doc.file,
                from = %doc.status,
                to = %status,
                "Document status reconciled"
            );
        }
        StatusDecision::Skipped(reason) => {
            tracing::debug!(document_id = %document_id, ?reason, "Reconciliation skipped");
        }
        StatusDecision::Unchanged => {}
    }
    Ok(decision)
}

fn link_agencies(conn: &Connection, links: &MergeLinks) -> Result<BTreeSet<Uuid>, ReconcileError> {
    let mut agencies = BTreeSet::new();
    for document_id in &links.document_ids {
        let doc = load_document(conn, document_id)?;
        agencies.extend(doc.agency_id);
    }
    for processed_id in &links.processed_document_ids {
        let pdoc = repository::get_processed_document(conn, processed_id)?.ok_or(
            ReconcileError::NotFound {
                entity_type: "ProcessedDocument",
                id: *processed_id,
            },
        )?;
        if let Some(document_id) = pdoc.document_id {
            agencies.extend(load_document(conn, &document_id)?.agency_id);
        }
    }
    Ok(agencies)
}

fn ensure_single_agency(
    merge_id: Uuid,
    agencies: impl IntoIterator<Item = Uuid>,
) -> Result<(), ReconcileError> {
    let agencies: BTreeSet<Uuid> = agencies.into_iter().collect();
    if agencies.len() > 1 {
        tracing::error!(merge_id = %merge_id, agencies = agencies.len(), "Merge spans agencies");
        return Err(ReconcileError::CrossAgencyMerge {
            merge_id,
            agencies: agencies.into_iter().collect(),
        });
    }
    Ok(())
}

fn propagate_merge(conn: &Connection, merge: &SyntheticDocument) -> Result<Vec<Uuid>, ReconcileError> {
    if !merge.completed {
        return Ok(Vec::new());
    }
    let links = repository::merge_links(conn, &merge.id)?;

    let mut targets: BTreeSet<Uuid> = links.document_ids.iter().copied().collect();
    for processed_id in &links.processed_document_ids {
        if let Some(pdoc) = repository::get_processed_document(conn, processed_id)? {
            targets.extend(pdoc.document_id);
        }
    }

    for document_id in &targets {
        repository::update_document_status(conn, document_id, Status::Complete)?;
    }
    tracing::info!(
        merge_id = %merge.id,
        documents = targets.len(),
        "Merge completed, linked documents marked complete"
    );
    Ok(targets.into_iter().collect())
}
