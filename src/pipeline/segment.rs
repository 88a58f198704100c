//! Segmentation of multi-incident case files.
//!
//! A reviewer marks which page ranges of an OCR'd PDF belong to which
//! incident; each range is then read on its own. Ranges are zero-indexed
//! and inclusive.

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use super::batch::{BatchError, BatchReport};
use super::import::paths::disk_path;
use super::ocr::OCR_SUFFIX;
use super::tools::{page_argument, CancelFlag, PageCounter, TextExtractor, ToolError};
use crate::db::{repository, DatabaseError};
use crate::models::{PageSpan, ProcessedDocument, ProcessedDocumentFilter, Status};
use crate::reconcile;

pub const SEGMENTABLE_STATUSES: &[Status] = &[
    Status::AwaitingReading,
    Status::AutoExtracted,
    Status::AwaitingExtraction,
    Status::CaseDoc,
    Status::Unchecked,
];

#[derive(Error, Debug, PartialEq)]
pub enum SegmentError {
    #[error("range {start}-{end} ends before it starts")]
    Reversed { start: u32, end: u32 },

    #[error("range {start}-{end} is past the last page ({pages} pages)")]
    OutOfRange { start: u32, end: u32, pages: u32 },

    #[error("range {start}-{end} overlaps or precedes the range before it")]
    Unordered { start: u32, end: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct SegmentOptions {
    pub media_root: PathBuf,
    pub cancel: CancelFlag,
}

/// Check incident ranges against each other and the page count, if known.
pub fn validate_incident_pages(spans: &[PageSpan], pages: Option<u32>) -> Result<(), SegmentError> {
    let mut previous_end: Option<u32> = None;
    for &[start, end] in spans {
        if start > end {
            return Err(SegmentError::Reversed { start, end });
        }
        if let Some(pages) = pages {
            if end >= pages {
                return Err(SegmentError::OutOfRange { start, end, pages });
            }
        }
        if previous_end.is_some_and(|prev| start <= prev) {
            return Err(SegmentError::Unordered { start, end });
        }
        previous_end = Some(end);
    }
    Ok(())
}

/// Validate and store the incident ranges of an artifact. An empty list
/// clears the segmentation.
pub fn set_incident_pages(
    conn: &Connection,
    artifact_id: &Uuid,
    spans: Vec<PageSpan>,
) -> Result<ProcessedDocument, BatchError> {
    let mut pdoc = repository::get_processed_document(conn, artifact_id)?
        .ok_or_else(|| DatabaseError::not_found("ProcessedDocument", artifact_id))?;
    validate_incident_pages(&spans, pdoc.pages)?;

    pdoc.incident_pgs = if spans.is_empty() { None } else { Some(spans) };
    reconcile::save_processed_document(conn, &pdoc)?;
    tracing::info!(
        file = %pdoc.file,
        segments = pdoc.incident_pgs.as_ref().map_or(0, Vec::len),
        "Incident pages set"
    );
    Ok(pdoc)
}

/// Page-range arguments for each incident, in order.
pub fn segment_arguments(pdoc: &ProcessedDocument) -> Vec<String> {
    pdoc.incident_pgs
        .iter()
        .flatten()
        .map(|span| page_argument(*span))
        .collect()
}

/// OCR'd PDFs worth segmenting, with page counts refreshed, most pages
/// first. Single-page and missing files are skipped; counting failures are
/// reported.
pub fn segmentable_artifacts(
    conn: &Connection,
    counter: &dyn PageCounter,
    options: &SegmentOptions,
) -> Result<(Vec<ProcessedDocument>, BatchReport), BatchError> {
    let artifacts = repository::list_processed_documents(
        conn,
        &ProcessedDocumentFilter {
            file_suffix: Some(OCR_SUFFIX.into()),
            document_statuses: SEGMENTABLE_STATUSES.to_vec(),
            ..Default::default()
        },
    )?;

    let mut report = BatchReport::default();
    let mut segmentable = Vec::new();
    for mut pdoc in artifacts {
        if options.cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        let path = disk_path(&options.media_root, &pdoc.file);
        if !path.exists() {
            report.skip(&pdoc.file, "file missing on disk");
            continue;
        }
        let pages = match counter.page_count(&path) {
            Ok(pages) => pages,
            Err(ToolError::Cancelled) => {
                report.cancelled = true;
                break;
            }
            Err(e) => {
                report.fail(&pdoc.file, e);
                continue;
            }
        };
        if pdoc.pages != Some(pages) {
            pdoc.pages = Some(pages);
            reconcile::save_processed_document(conn, &pdoc)?;
        }
        if pages <= 1 {
            report.skip(&pdoc.file, "single page");
            continue;
        }
        report.done(&pdoc.file);
        segmentable.push(pdoc);
    }

    segmentable.sort_by(|a, b| b.pages.cmp(&a.pages).then_with(|| a.file.cmp(&b.file)));
    report.log_summary("segment");
    Ok((segmentable, report))
}

/// Text of each incident of a segmented artifact.
pub fn segment_texts(
    pdoc: &ProcessedDocument,
    media_root: &Path,
    extractor: &dyn TextExtractor,
) -> Result<Vec<(PageSpan, String)>, ToolError> {
    let path = disk_path(media_root, &pdoc.file);
    pdoc.incident_pgs
        .iter()
        .flatten()
        .map(|span| Ok((*span, extractor.extract_text(&path, Some(*span))?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::*;
    use crate::db::sqlite::open_memory_database;
    use crate::models::Document;
    use crate::pipeline::tools::fakes::{FakePages, FakeText};
    use std::fs;

    fn setup(media: &Path, files: &[(&str, Status, bool)]) -> (Connection, Vec<ProcessedDocument>) {
        let conn = open_memory_database().unwrap();
        let (agency, _) = get_or_create_agency(&conn, "Kent").unwrap();
        let mut artifacts = Vec::new();
        for (name, status, on_disk) in files {
            let mut doc = Document::new(Some(agency.id), format!("agency_attachments/Kent/{name}.pdf"));
            doc.status = *status;
            insert_document(&conn, &doc).unwrap();
            let pdoc = ProcessedDocument::with_status(
                Some(doc.id),
                format!("agency_attachments/Kent/{name}.ocr.pdf"),
                Status::AwaitingReading,
            );
            insert_processed_document(&conn, &pdoc).unwrap();
            if *on_disk {
                let path = disk_path(media, &pdoc.file);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, b"%PDF").unwrap();
            }
            artifacts.push(pdoc);
        }
        (conn, artifacts)
    }

    #[test]
    fn validates_ranges() {
        assert!(validate_incident_pages(&[], Some(3)).is_ok());
        assert!(validate_incident_pages(&[[0, 2], [3, 3], [5, 9]], Some(10)).is_ok());
        assert!(validate_incident_pages(&[[0, 200]], None).is_ok());

        assert_eq!(
            validate_incident_pages(&[[4, 2]], None),
            Err(SegmentError::Reversed { start: 4, end: 2 })
        );
        assert_eq!(
            validate_incident_pages(&[[0, 10]], Some(10)),
            Err(SegmentError::OutOfRange { start: 0, end: 10, pages: 10 })
        );
        assert_eq!(
            validate_incident_pages(&[[0, 4], [4, 6]], None),
            Err(SegmentError::Unordered { start: 4, end: 6 })
        );
        assert_eq!(
            validate_incident_pages(&[[5, 6], [0, 1]], None),
            Err(SegmentError::Unordered { start: 0, end: 1 })
        );
    }

    #[test]
    fn segmentable_ordered_by_pages() {
        let media = tempfile::tempdir().unwrap();
        let (conn, _) = setup(
            media.path(),
            &[
                ("short", Status::AwaitingReading, true),
                ("long", Status::CaseDoc, true),
                ("single", Status::AwaitingReading, true),
                ("gone", Status::AwaitingReading, false),
                ("done", Status::Complete, true),
                ("broken", Status::Unchecked, true),
            ],
        );
        let counter = FakePages {
            pages: [
                ("short.ocr.pdf", 3),
                ("long.ocr.pdf", 40),
                ("single.ocr.pdf", 1),
                ("done.ocr.pdf", 9),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        };
        let options = SegmentOptions {
            media_root: media.path().to_path_buf(),
            ..Default::default()
        };

        let (segmentable, report) = segmentable_artifacts(&conn, &counter, &options).unwrap();
        let names: Vec<&str> = segmentable.iter().map(|p| p.file.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "agency_attachments/Kent/long.ocr.pdf",
                "agency_attachments/Kent/short.ocr.pdf"
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].file, "agency_attachments/Kent/broken.ocr.pdf");
        assert_eq!(report.skipped.len(), 2);

        // Page counts were persisted, including for single-page files.
        let single = get_processed_by_file(&conn, "agency_attachments/Kent/single.ocr.pdf")
            .unwrap()
            .unwrap();
        assert_eq!(single.pages, Some(1));
    }

    #[test]
    fn incident_pages_round_trip_through_storage() {
        let media = tempfile::tempdir().unwrap();
        let (conn, artifacts) = setup(media.path(), &[("case", Status::CaseDoc, true)]);
        let mut pdoc = artifacts[0].clone();
        pdoc.pages = Some(12);
        update_processed_document(&conn, &pdoc).unwrap();

        let err = set_incident_pages(&conn, &pdoc.id, vec![[0, 12]]).unwrap_err();
        assert!(matches!(err, BatchError::Segment(SegmentError::OutOfRange { .. })));

        let saved = set_incident_pages(&conn, &pdoc.id, vec![[0, 3], [4, 11]]).unwrap();
        assert_eq!(segment_arguments(&saved), vec!["0-3", "4-11"]);
        let stored = get_processed_document(&conn, &pdoc.id).unwrap().unwrap();
        assert_eq!(stored.incident_pgs, Some(vec![[0, 3], [4, 11]]));

        let cleared = set_incident_pages(&conn, &pdoc.id, Vec::new()).unwrap();
        assert!(cleared.incident_pgs.is_none());
        assert!(segment_arguments(&cleared).is_empty());
    }

    #[test]
    fn unknown_artifact_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = set_incident_pages(&conn, &Uuid::new_v4(), vec![[0, 1]]).unwrap_err();
        assert!(matches!(err, BatchError::Database(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn reads_each_segment_separately() {
        let mut pdoc = ProcessedDocument::new(None, "agency_attachments/Kent/case.ocr.pdf");
        pdoc.incident_pgs = Some(vec![[0, 1], [2, 5]]);
        let extractor = FakeText {
            texts: [("case.ocr.pdf".to_string(), "text".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let texts = segment_texts(&pdoc, Path::new("/media"), &extractor).unwrap();
        assert_eq!(texts.len(), 2);
        let calls = extractor.calls.borrow();
        assert_eq!(calls[0].1, Some([0, 1]));
        assert_eq!(calls[1].1, Some([2, 5]));
    }
}
