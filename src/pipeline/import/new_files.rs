//! Incremental import: pick up files added to an already imported tree.
//!
//! Unlike the bulk importer this never regroups anything. Each unknown file
//! is typed on its own, and derived files are hung off an existing document
//! by path prefix. Whatever cannot be decided automatically goes to the
//! caller's [`ImportStrategy`].

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use super::parent::{FileKind, ImportStrategy, ParentAnswer};
use super::paths::document_file_path;
use super::scan::{scan_attachments, ScanOptions};
use super::ImportError;
use crate::config::STORAGE_ROOT;
use crate::db::repository;
use crate::models::{Agency, Document, ProcessedDocument, Status};
use crate::reconcile;
use crate::status;

/// Extensions of files an agency sends us, compared case-insensitively.
const RESPONSIVE_EXTENSIONS: &[&str] = &[
    ".pdf", ".xlsx", ".doc", ".docx", ".msg", ".eml", ".mp3", ".wma",
];

/// Stage suffixes stripped from a derived file to find its parent.
/// Longest first so `.cleaned.csv` wins over `.csv`.
const PROCESSED_SUFFIXES: &[&str] = &[
    ".precleaned.csv",
    ".complete.csv",
    ".cleaned.csv",
    ".rough.csv",
    ".auto.csv",
    ".ocr.pdf",
    ".csv",
    ".txt",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewFileReport {
    pub agencies_created: Vec<String>,
    pub documents_added: Vec<String>,
    pub artifacts_added: Vec<String>,
    /// Files left alone because no type or parent could be settled.
    pub unresolved: Vec<String>,
    /// Agencies not in the database whose creation was declined.
    pub skipped_agencies: Vec<String>,
}

/// Type of a new file when it can be told from the name alone.
pub fn classify_new_file(path: &str) -> Option<FileKind> {
    if !path.ends_with(".txt") {
        let derived = matches!(
            status::classify(path),
            Status::Complete | Status::AwaitingCleaning | Status::AwaitingCsv | Status::AutoExtracted
        );
        if derived || path.ends_with(".csv") {
            return Some(FileKind::Processed);
        }
    }
    let lower = path.to_lowercase();
    if RESPONSIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Some(FileKind::Responsive);
    }
    None
}

/// Path prefix the parent document of a derived file should start with.
pub fn parent_prefix(path: &str) -> &str {
    PROCESSED_SUFFIXES
        .iter()
        .find_map(|suffix| path.strip_suffix(suffix))
        .unwrap_or(path)
}

/// Import every file under `root` that is neither a document nor an
/// artifact yet.
pub fn import_new_files(
    conn: &Connection,
    root: &Path,
    options: &ScanOptions,
    strategy: &mut dyn ImportStrategy,
) -> Result<NewFileReport, ImportError> {
    let mut report = NewFileReport::default();

    for (agency_name, files) in scan_attachments(root, options)? {
        let mut new_files = Vec::new();
        for file in &files {
            let path = document_file_path(&agency_name, &file.relative_path);
            if !is_known(conn, &path)? {
                new_files.push(path);
            }
        }
        if new_files.is_empty() {
            continue;
        }

        let agency = match repository::get_agency_by_name(conn, &agency_name)? {
            Some(agency) => agency,
            None if strategy.approve_agency(&agency_name, &new_files) => {
                let (agency, _) = repository::get_or_create_agency(conn, &agency_name)?;
                report.agencies_created.push(agency_name.clone());
                agency
            }
            None => {
                tracing::info!(agency = %agency_name, files = new_files.len(), "Agency not created, skipping");
                report.skipped_agencies.push(agency_name);
                continue;
            }
        };

        for path in new_files {
            import_file(conn, &agency, path, strategy, &mut report)?;
        }
    }

    tracing::info!(
        documents = report.documents_added.len(),
        artifacts = report.artifacts_added.len(),
        unresolved = report.unresolved.len(),
        "New-file import complete"
    );
    Ok(report)
}

fn is_known(conn: &Connection, path: &str) -> Result<bool, ImportError> {
    Ok(repository::get_document_by_file(conn, path)?.is_some()
        || repository::get_processed_by_file(conn, path)?.is_some())
}

fn import_file(
    conn: &Connection,
    agency: &Agency,
    path: String,
    strategy: &mut dyn ImportStrategy,
    report: &mut NewFileReport,
) -> Result<(), ImportError> {
    let kind = classify_new_file(&path).or_else(|| strategy.classify(&path));
    match kind {
        Some(FileKind::Responsive) => {
            let mut doc = Document::new(Some(agency.id), path.as_str());
            doc.status = status::classify(&path);
            reconcile::save_document(conn, &mut doc)?;
            tracing::info!(file = %path, status = %doc.status, "New document");
            report.documents_added.push(path);
        }
        Some(FileKind::Processed) => match find_parent(conn, agency, &path, strategy)? {
            Some(parent) => {
                let pdoc = ProcessedDocument::new(Some(parent.id), path.as_str());
                reconcile::save_processed_document(conn, &pdoc)?;
                tracing::info!(file = %path, parent = %parent.file, "New artifact");
                report.artifacts_added.push(path);
            }
            None => report.unresolved.push(path),
        },
        None => report.unresolved.push(path),
    }
    Ok(())
}

fn find_parent(
    conn: &Connection,
    agency: &Agency,
    path: &str,
    strategy: &mut dyn ImportStrategy,
) -> Result<Option<Document>, ImportError> {
    let mut candidates = repository::documents_with_file_prefix(conn, &agency.id, parent_prefix(path))?;
    if candidates.len() == 1 {
        return Ok(candidates.pop());
    }

    tracing::debug!(file = %path, candidates = candidates.len(), "Parent needs a decision");
    match strategy.choose_parent(path, &candidates) {
        ParentAnswer::Skip => Ok(None),
        ParentAnswer::Candidate(ix) => Ok(candidates.into_iter().nth(ix)),
        ParentAnswer::File(file) => {
            let file = if file.starts_with(STORAGE_ROOT) {
                file
            } else {
                document_file_path(&agency.name, &file)
            };
            let parent = repository::get_document_by_agency_file(conn, Some(&agency.id), &file)?;
            if parent.is_none() {
                tracing::warn!(file = %path, parent = %file, "Named parent does not exist");
            }
            Ok(parent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::*;
    use crate::db::sqlite::open_memory_database;
    use crate::pipeline::import::parent::{FixedAnswers, SkipUnresolved};
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    fn seed(conn: &Connection, agency: &str, files: &[&str]) -> Agency {
        let (agency, _) = get_or_create_agency(conn, agency).unwrap();
        for file in files {
            insert_document(conn, &Document::new(Some(agency.id), document_file_path(&agency.name, file)))
                .unwrap();
        }
        agency
    }

    #[test]
    fn classifies_by_name() {
        assert_eq!(classify_new_file("a/letter.cleaned.csv"), Some(FileKind::Processed));
        assert_eq!(classify_new_file("a/letter.rough.csv"), Some(FileKind::Processed));
        assert_eq!(classify_new_file("a/scan.ocr.pdf"), Some(FileKind::Processed));
        assert_eq!(classify_new_file("a/scan.PDF"), Some(FileKind::Responsive));
        assert_eq!(classify_new_file("a/mail.eml"), Some(FileKind::Responsive));
        assert_eq!(classify_new_file("a/call.mp3"), Some(FileKind::Responsive));
        assert_eq!(classify_new_file("a/notes.txt"), None);
        assert_eq!(classify_new_file("a/photo.jpg"), None);
    }

    #[test]
    fn prefix_strips_one_stage_suffix() {
        assert_eq!(parent_prefix("k/letter.cleaned.csv"), "k/letter");
        assert_eq!(parent_prefix("k/letter.ocr.pdf"), "k/letter");
        assert_eq!(parent_prefix("k/letter.csv"), "k/letter");
        assert_eq!(parent_prefix("k/letter.pdf"), "k/letter.pdf");
    }

    #[test]
    fn imports_only_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        seed(&conn, "Kent", &["letter.pdf"]);

        touch(dir.path(), "Kent/letter.pdf");
        touch(dir.path(), "Kent/letter.cleaned.csv");
        touch(dir.path(), "Kent/memo.msg");

        let report =
            import_new_files(&conn, dir.path(), &ScanOptions::default(), &mut SkipUnresolved).unwrap();
        assert_eq!(report.documents_added, vec!["agency_attachments/Kent/memo.msg"]);
        assert_eq!(report.artifacts_added, vec!["agency_attachments/Kent/letter.cleaned.csv"]);
        assert!(report.unresolved.is_empty());

        let letter = get_document_by_file(&conn, "agency_attachments/Kent/letter.pdf")
            .unwrap()
            .unwrap();
        assert_eq!(letter.status, Status::Complete);
        let memo = get_document_by_file(&conn, "agency_attachments/Kent/memo.msg")
            .unwrap()
            .unwrap();
        assert_eq!(memo.status, Status::AwaitingReading);

        // Second pass finds nothing new.
        let again =
            import_new_files(&conn, dir.path(), &ScanOptions::default(), &mut SkipUnresolved).unwrap();
        assert!(again.documents_added.is_empty());
        assert!(again.artifacts_added.is_empty());
    }

    #[test]
    fn ambiguous_files_go_to_the_strategy() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        seed(&conn, "Kent", &["letter.pdf", "log.pdf", "log.xlsx"]);

        touch(dir.path(), "Kent/notes.txt");
        touch(dir.path(), "Kent/log.csv");
        touch(dir.path(), "Kent/summary.csv");

        let mut answers = FixedAnswers::default();
        answers
            .kinds
            .insert("agency_attachments/Kent/notes.txt".into(), FileKind::Processed);
        answers.parents.insert(
            "agency_attachments/Kent/notes.txt".into(),
            ParentAnswer::File("letter.pdf".into()),
        );
        answers
            .parents
            .insert("agency_attachments/Kent/log.csv".into(), ParentAnswer::Candidate(1));

        let report = import_new_files(&conn, dir.path(), &ScanOptions::default(), &mut answers).unwrap();
        assert_eq!(
            report.artifacts_added,
            vec!["agency_attachments/Kent/log.csv", "agency_attachments/Kent/notes.txt"]
        );
        assert_eq!(report.unresolved, vec!["agency_attachments/Kent/summary.csv"]);

        let log = get_processed_by_file(&conn, "agency_attachments/Kent/log.csv")
            .unwrap()
            .unwrap();
        let parent = get_document(&conn, &log.document_id.unwrap()).unwrap().unwrap();
        assert_eq!(parent.file, "agency_attachments/Kent/log.xlsx");

        let notes = get_processed_by_file(&conn, "agency_attachments/Kent/notes.txt")
            .unwrap()
            .unwrap();
        let parent = get_document(&conn, &notes.document_id.unwrap()).unwrap().unwrap();
        assert_eq!(parent.file, "agency_attachments/Kent/letter.pdf");
    }

    #[test]
    fn missing_agency_needs_approval() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_memory_database().unwrap();
        touch(dir.path(), "Auburn/a.pdf");
        touch(dir.path(), "Kent/b.pdf");

        let mut answers = FixedAnswers {
            agencies: vec!["Kent".into()],
            ..Default::default()
        };
        let report = import_new_files(&conn, dir.path(), &ScanOptions::default(), &mut answers).unwrap();

        assert_eq!(report.skipped_agencies, vec!["Auburn"]);
        assert_eq!(report.agencies_created, vec!["Kent"]);
        assert_eq!(report.documents_added, vec!["agency_attachments/Kent/b.pdf"]);
        assert!(get_agency_by_name(&conn, "Auburn").unwrap().is_none());
    }
}
