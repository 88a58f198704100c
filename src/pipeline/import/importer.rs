use std::collections::HashMap;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use super::grouping::group_files;
use super::paths::document_file_path;
use super::resolve::{resolve_group, GroupResolution};
use super::scan::{scan_attachments, ScanOptions, ScannedFile};
use super::ImportError;
use crate::db::{in_immediate, repository};
use crate::models::{Agency, ProcessedDocument};
use crate::reconcile;

/// Outcome of one file group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GroupOutcome {
    /// At least one new row was written.
    Imported,
    /// Every row already existed.
    AlreadyImported,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupImport {
    pub agency: String,
    pub resolution: GroupResolution,
    pub outcome: GroupOutcome,
}

/// Totals for an import run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub agencies_created: usize,
    pub documents_created: usize,
    pub artifacts_created: usize,
    pub groups: Vec<GroupImport>,
}

impl ImportReport {
    pub fn failures(&self) -> impl Iterator<Item = &GroupImport> {
        self.groups
            .iter()
            .filter(|g| matches!(g.outcome, GroupOutcome::Failed(_)))
    }
}

/// Resolve every group of a scanned tree without touching the database.
pub fn plan_import(root: &Path, options: &ScanOptions) -> Result<Vec<(String, GroupResolution)>, ImportError> {
    let mut plan = Vec::new();
    for (agency, files) in scan_attachments(root, options)? {
        plan.extend(resolve_agency(&files).into_iter().map(|r| (agency.clone(), r)));
    }
    Ok(plan)
}

/// Scan `root` and import everything found. Re-running is safe: existing
/// documents and artifacts are looked up, never duplicated.
pub fn import_tree(
    conn: &Connection,
    root: &Path,
    options: &ScanOptions,
) -> Result<ImportReport, ImportError> {
    let mut report = ImportReport::default();
    for (agency, files) in scan_attachments(root, options)? {
        import_agency(conn, &agency, &files, &mut report)?;
    }
    tracing::info!(
        agencies_created = report.agencies_created,
        documents_created = report.documents_created,
        artifacts_created = report.artifacts_created,
        failed = report.failures().count(),
        "Import complete"
    );
    Ok(report)
}

/// Import one agency's files. A failing group is rolled back, recorded and
/// skipped; the rest of the agency still imports. Inside a caller's
/// transaction the groups join it and rollback is left to the caller.
pub fn import_agency(
    conn: &Connection,
    agency_name: &str,
    files: &[ScannedFile],
    report: &mut ImportReport,
) -> Result<(), ImportError> {
    let (agency, created) = repository::get_or_create_agency(conn, agency_name)?;
    if created {
        report.agencies_created += 1;
    }

    for resolution in resolve_agency(files) {
        let outcome = match import_group(conn, &agency, &resolution) {
            Ok((documents, artifacts)) => {
                report.documents_created += documents;
                report.artifacts_created += artifacts;
                if documents + artifacts > 0 {
                    GroupOutcome::Imported
                } else {
                    GroupOutcome::AlreadyImported
                }
            }
            Err(e) => {
                tracing::warn!(
                    agency = %agency.name,
                    file = %resolution.original,
                    error = %e,
                    "Failed to import group"
                );
                GroupOutcome::Failed(e.to_string())
            }
        };
        report.groups.push(GroupImport {
            agency: agency.name.clone(),
            resolution,
            outcome,
        });
    }
    Ok(())
}

fn resolve_agency(files: &[ScannedFile]) -> Vec<GroupResolution> {
    let by_path: HashMap<&str, &ScannedFile> = files
        .iter()
        .map(|f| (f.relative_path.as_str(), f))
        .collect();
    let paths: Vec<&str> = files.iter().map(|f| f.relative_path.as_str()).collect();

    group_files(&paths)
        .values()
        .filter_map(|group| {
            let members: Vec<&ScannedFile> = group
                .iter()
                .filter_map(|path| by_path.get(path.as_str()).copied())
                .collect();
            resolve_group(&members)
        })
        .collect()
}

/// Write one group. Returns (documents created, artifacts created).
fn import_group(
    conn: &Connection,
    agency: &Agency,
    resolution: &GroupResolution,
) -> Result<(usize, usize), ImportError> {
    in_immediate(conn, |tx| {
        let file = document_file_path(&agency.name, &resolution.original);
        let (mut doc, doc_created) =
            repository::get_or_create_document(tx, Some(agency.id), &file)?;
        if doc_created {
            // A lone file starts at its own stage; artifacts refine it below.
            doc.status = resolution.status;
            reconcile::save_document(tx, &mut doc)?;
            tracing::info!(file = %doc.file, status = %doc.status, "Document imported");
        }

        let mut artifacts_created = 0;
        for artifact in &resolution.artifacts {
            let path = document_file_path(&agency.name, artifact);
            if repository::get_processed_by_file(tx, &path)?.is_some() {
                continue;
            }
            let mut pdoc = ProcessedDocument::new(Some(doc.id), path);
            pdoc.source_page = resolution.source_page.clone();
            pdoc.source_sheet = resolution.source_sheet.clone();
            reconcile::save_processed_document(tx, &pdoc)?;
            artifacts_created += 1;
            tracing::debug!(file = %pdoc.file, status = %pdoc.status, "Artifact imported");
        }

        Ok((usize::from(doc_created), artifacts_created))
    })
}
