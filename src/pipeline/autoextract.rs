//! Auto-extraction: turn the text layer of an OCR'd case document into a
//! one-column `.auto.csv` that a reviewer can start from, and the matching
//! revert that throws those files away again.

use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;

use super::batch::{with_stage_suffix, AgencyScope, BatchError, BatchReport};
use super::import::paths::disk_path;
use super::ocr::OCR_SUFFIX;
use super::tools::{CancelFlag, TextExtractor, ToolError};
use crate::db::repository;
use crate::models::{Document, DocumentFilter, ProcessedDocument, ProcessedDocumentFilter, Status};
use crate::reconcile;

pub const AUTO_CSV_SUFFIX: &str = ".auto.csv";

pub const TEXT_COLUMN: &str = "document_text";

pub const AUTOEXTRACT_CANDIDATE_STATUSES: &[Status] = &[
    Status::AutoExtracted,
    Status::AwaitingReading,
    Status::AwaitingExtraction,
    Status::CaseDoc,
];

#[derive(Debug, Clone, Default)]
pub struct AutoExtractOptions {
    pub media_root: PathBuf,
    pub cancel: CancelFlag,
}

/// A document ready for auto-extraction and the OCR artifact to read.
#[derive(Debug, Clone)]
pub struct AutoExtractCandidate {
    pub document: Document,
    pub ocr: ProcessedDocument,
    /// Existing `.auto.csv` artifact, overwritten on success.
    pub previous: Option<ProcessedDocument>,
}

/// Documents with an OCR artifact and nothing further along than a previous
/// auto-extraction. Anything with a real CSV is left for humans.
pub fn autoextract_candidates(conn: &Connection) -> Result<Vec<AutoExtractCandidate>, BatchError> {
    let docs = repository::list_documents(
        conn,
        &DocumentFilter {
            statuses: AUTOEXTRACT_CANDIDATE_STATUSES.to_vec(),
            file_suffix: Some(".pdf".into()),
            no_new_records: Some(false),
            ..Default::default()
        },
    )?;

    let mut candidates = Vec::new();
    for document in docs {
        let artifacts = repository::list_for_document(conn, &document.id)?;
        let unacceptable = artifacts
            .iter()
            .any(|p| !p.file.ends_with(OCR_SUFFIX) && !p.file.ends_with(AUTO_CSV_SUFFIX));
        if unacceptable {
            tracing::debug!(file = %document.file, "Not an auto-extraction candidate");
            continue;
        }
        let Some(ocr) = artifacts.iter().find(|p| p.file.ends_with(OCR_SUFFIX)).cloned() else {
            continue;
        };
        let previous = artifacts.into_iter().find(|p| p.file.ends_with(AUTO_CSV_SUFFIX));
        candidates.push(AutoExtractCandidate {
            document,
            ocr,
            previous,
        });
    }
    Ok(candidates)
}

pub fn run_autoextract_batch(
    conn: &Connection,
    extractor: &dyn TextExtractor,
    options: &AutoExtractOptions,
) -> Result<BatchReport, BatchError> {
    let mut report = BatchReport::default();

    for candidate in autoextract_candidates(conn)? {
        if options.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let doc = &candidate.document;
        let pdf = disk_path(&options.media_root, &candidate.ocr.file);

        let text = match extractor.extract_text(&pdf, None) {
            Ok(text) => text,
            Err(ToolError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                report.fail(&doc.file, e);
                continue;
            }
        };
        tracing::debug!(file = %doc.file, bytes = text.len(), "Extracted document text");

        let csv_file = with_stage_suffix(&doc.file, AUTO_CSV_SUFFIX);
        let target = disk_path(&options.media_root, &csv_file);
        if let Err(e) = write_text_csv(&target, &text) {
            report.fail(&doc.file, e);
            continue;
        }

        let mut pdoc = candidate
            .previous
            .clone()
            .unwrap_or_else(|| ProcessedDocument::with_status(Some(doc.id), csv_file.as_str(), Status::AutoExtracted));
        pdoc.file = csv_file;
        pdoc.status = Status::AutoExtracted;
        reconcile::save_processed_document(conn, &pdoc)?;
        report.done(&doc.file);
    }

    report.log_summary("autoextract");
    Ok(report)
}

/// Quote a CSV field when it needs it.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write a single-column CSV holding `text`. The file is written next to the
/// target and renamed into place, so readers never see a partial file.
pub fn write_text_csv(target: &Path, text: &str) -> Result<(), std::io::Error> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    write!(tmp, "{TEXT_COLUMN}\r\n{}\r\n", csv_field(text))?;
    tmp.flush()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RevertReport {
    pub dry_run: bool,
    /// Documents moved back to awaiting-reading.
    pub documents: Vec<String>,
    /// `.auto.csv` artifacts removed.
    pub removed: Vec<String>,
    pub failures: Vec<(String, String)>,
}

/// Undo auto-extraction: remove `.auto.csv` files and rows and move the
/// documents back to awaiting-reading. With `dry_run` nothing is touched.
pub fn revert_autoextraction(
    conn: &Connection,
    media_root: &Path,
    scope: &AgencyScope,
    dry_run: bool,
) -> Result<RevertReport, BatchError> {
    let mut report = RevertReport {
        dry_run,
        ..Default::default()
    };

    for agency in scope.agencies(conn)? {
        let docs = repository::list_documents(
            conn,
            &DocumentFilter {
                agency_id: Some(agency.id),
                statuses: vec![Status::AutoExtracted],
                file_suffix: Some(".pdf".into()),
                no_new_records: Some(false),
                ..Default::default()
            },
        )?;
        if docs.is_empty() {
            continue;
        }
        tracing::info!(agency = %agency.name, documents = docs.len(), dry_run, "Reverting auto-extractions");

        for doc in docs {
            if revert_document(conn, media_root, &doc, dry_run, &mut report)? {
                report.documents.push(doc.file);
            }
        }
    }
    Ok(report)
}

/// Returns false when a file could not be removed; the document keeps its
/// status then so a later run can retry.
fn revert_document(
    conn: &Connection,
    media_root: &Path,
    doc: &Document,
    dry_run: bool,
    report: &mut RevertReport,
) -> Result<bool, BatchError> {
    let auto_csvs = repository::list_processed_documents(
        conn,
        &ProcessedDocumentFilter {
            document_id: Some(doc.id),
            file_suffix: Some(AUTO_CSV_SUFFIX.into()),
            ..Default::default()
        },
    )?;

    for pdoc in auto_csvs {
        if dry_run {
            report.removed.push(pdoc.file);
            continue;
        }
        let path = disk_path(media_root, &pdoc.file);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(file = %pdoc.file, "Auto-CSV missing on disk, removing row only");
            }
            Err(e) => {
                tracing::warn!(file = %pdoc.file, error = %e, "Could not delete auto-CSV");
                report.failures.push((pdoc.file, e.to_string()));
                return Ok(false);
            }
        }
        repository::delete_processed_document(conn, &pdoc.id)?;
        report.removed.push(pdoc.file);
    }

    if !dry_run {
        reconcile::override_document_status(conn, &doc.id, Status::AwaitingReading)?;
    }
    Ok(true)
}
