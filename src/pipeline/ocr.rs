//! OCR batch: give every unread PDF document a searchable `.ocr.pdf`
//! artifact.
//!
//! Output that already exists (on disk or as an artifact) is never redone.
//! A pre-OCR folder of externally converted files is consulted first; since
//! that folder is flat across agencies, a match is only used when the PDF's
//! file name is unique among all documents.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::batch::{with_stage_suffix, BatchError, BatchReport};
use super::import::paths::{disk_path, file_name};
use super::tools::{CancelFlag, OcrEngine, ToolError};
use crate::db::repository;
use crate::models::{Document, DocumentFilter, ProcessedDocument, Status};
use crate::reconcile;

pub const OCR_SUFFIX: &str = ".ocr.pdf";

/// Alternate extension used by some external converters.
const ALT_OCR_SUFFIX: &str = ".ocr-pdf";

/// Document stages that still need reading.
pub const OCR_CANDIDATE_STATUSES: &[Status] = &[
    Status::AwaitingReading,
    Status::AwaitingExtraction,
    Status::CaseDoc,
    Status::Unchecked,
];

#[derive(Debug, Clone, Default)]
pub struct OcrOptions {
    pub media_root: PathBuf,
    pub pre_ocr_dir: Option<PathBuf>,
    pub cancel: CancelFlag,
}

/// PDF documents that may need OCR, before the per-file existence checks.
pub fn ocr_candidates(conn: &Connection) -> Result<Vec<Document>, BatchError> {
    Ok(repository::list_documents(
        conn,
        &DocumentFilter {
            statuses: OCR_CANDIDATE_STATUSES.to_vec(),
            file_suffix: Some(".pdf".into()),
            exclude_file_suffix: Some(OCR_SUFFIX.into()),
            no_new_records: Some(false),
            ..Default::default()
        },
    )?)
}

/// Index a pre-OCR folder by the `.ocr.pdf` name each file stands for.
pub fn index_pre_ocr_dir(dir: &Path) -> Result<HashMap<String, PathBuf>, BatchError> {
    let mut index = HashMap::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let key = if let Some(stem) = name.strip_suffix(ALT_OCR_SUFFIX) {
            format!("{stem}{OCR_SUFFIX}")
        } else if name.ends_with(OCR_SUFFIX) {
            name
        } else {
            continue;
        };
        index.insert(key, entry.path());
    }
    tracing::info!(dir = %dir.display(), files = index.len(), "Indexed pre-OCR folder");
    Ok(index)
}

pub fn run_ocr_batch(
    conn: &Connection,
    engine: &dyn OcrEngine,
    options: &OcrOptions,
) -> Result<BatchReport, BatchError> {
    let pre_ocr = match &options.pre_ocr_dir {
        Some(dir) => index_pre_ocr_dir(dir)?,
        None => HashMap::new(),
    };

    let mut report = BatchReport::default();
    for doc in ocr_candidates(conn)? {
        if options.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let ocr_file = with_stage_suffix(&doc.file, OCR_SUFFIX);
        let input = disk_path(&options.media_root, &doc.file);
        let output = disk_path(&options.media_root, &ocr_file);

        if output.exists() {
            report.skip(&doc.file, "OCR output already on disk");
            continue;
        }
        let has_ocr_artifact = match repository::list_for_document(conn, &doc.id) {
            Ok(artifacts) => artifacts.iter().any(|p| p.file.ends_with(OCR_SUFFIX)),
            Err(e) => {
                report.fail(&doc.file, e);
                continue;
            }
        };
        if has_ocr_artifact {
            report.skip(&doc.file, "OCR artifact already exists");
            continue;
        }

        if let Some(source) = pre_ocr.get(file_name(&ocr_file)) {
            match copy_pre_ocr(conn, &doc, source, &output) {
                Ok(true) => {
                    record_ocr_artifact(conn, &doc, ocr_file, &mut report);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    report.fail(&doc.file, e);
                    continue;
                }
            }
        }

        if !input.exists() {
            report.fail(&doc.file, "source file missing on disk");
            continue;
        }

        tracing::info!(file = %doc.file, "OCRing document");
        match engine.ocr(&input, &output) {
            Ok(()) => record_ocr_artifact(conn, &doc, ocr_file, &mut report),
            Err(ToolError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => report.fail(&doc.file, e),
        }
    }

    report.log_summary("ocr");
    Ok(report)
}

/// Copy a pre-converted file into place when the document's name is unique.
fn copy_pre_ocr(conn: &Connection, doc: &Document, source: &Path, output: &Path) -> Result<bool, BatchError> {
    let matches = repository::count_documents_named(conn, doc.file_name())?;
    if matches > 1 {
        tracing::info!(
            file = %doc.file,
            matches,
            "Pre-OCR match ignored, file name is not unique"
        );
        return Ok(false);
    }
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, output)?;
    tracing::info!(file = %doc.file, source = %source.display(), "Used pre-OCR file");
    Ok(true)
}

/// OCR output still needs reading, whatever its extension says.
fn record_ocr_artifact(conn: &Connection, doc: &Document, file: String, report: &mut BatchReport) {
    let pdoc = ProcessedDocument::with_status(Some(doc.id), file, Status::AwaitingReading);
    match reconcile::save_processed_document(conn, &pdoc) {
        Ok(_) => report.done(&doc.file),
        Err(e) => report.fail(&doc.file, e),
    }
}
