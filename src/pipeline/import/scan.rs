//! Directory scan of an `agency_attachments` tree.
//!
//! Each top-level directory is one agency; everything beneath it (at any
//! depth) belongs to that agency. Housekeeping files are dropped here so
//! the grouping step only ever sees candidate documents.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use walkdir::{DirEntry, WalkDir};

use super::ImportError;

/// Filenames the importers never pick up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IgnoreRules {
    /// Exact names, compared case-insensitively.
    pub names: Vec<String>,
    /// Substrings of the lowercased name.
    pub contains: Vec<String>,
    /// Case-sensitive name suffixes.
    pub suffixes: Vec<String>,
    pub skip_hidden: bool,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            names: vec!["records-request.pdf".into(), "joined.csv".into()],
            contains: vec!["exemption log".into(), "redaction log".into()],
            suffixes: vec![
                ".sh".into(),
                ".zip".into(),
                ".py".into(),
                ".extractor.yaml".into(),
            ],
            skip_hidden: true,
        }
    }
}

impl IgnoreRules {
    pub fn is_ignored(&self, file_name: &str) -> bool {
        if self.skip_hidden && file_name.starts_with('.') {
            return true;
        }
        let lower = file_name.to_lowercase();
        self.names.iter().any(|n| n.to_lowercase() == lower)
            || self.contains.iter().any(|c| lower.contains(&c.to_lowercase()))
            || self.suffixes.iter().any(|s| file_name.ends_with(s.as_str()))
    }
}

/// Which agencies to scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub only_agency: Option<String>,
    pub ignore_agencies: Vec<String>,
    pub rules: IgnoreRules,
}

impl ScanOptions {
    fn wants_agency(&self, agency: &str) -> bool {
        if let Some(only) = &self.only_agency {
            if only != agency {
                return false;
            }
        }
        !self.ignore_agencies.iter().any(|a| a == agency)
    }
}

/// One file found under an agency directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Path under the agency directory, `/`-separated.
    pub relative_path: String,
    pub modified: SystemTime,
}

/// Files per agency, both sorted by name.
pub type AgencyFiles = BTreeMap<String, Vec<ScannedFile>>;

/// Walk `root` (an `agency_attachments` directory). Unreadable entries are
/// logged and skipped; agencies with no remaining files are omitted.
pub fn scan_attachments(root: &Path, options: &ScanOptions) -> Result<AgencyFiles, ImportError> {
    if !root.is_dir() {
        return Err(ImportError::NotADirectory(root.to_path_buf()));
    }

    let mut agencies = AgencyFiles::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        if !options.wants_agency(&name) {
            tracing::debug!(agency = %name, "Agency filtered out of scan");
            continue;
        }

        let files = scan_agency_dir(&entry.path(), &options.rules);
        if !files.is_empty() {
            agencies.insert(name, files);
        }
    }

    tracing::info!(
        root = %root.display(),
        agencies = agencies.len(),
        files = agencies.values().map(Vec::len).sum::<usize>(),
        "Attachment scan complete"
    );
    Ok(agencies)
}

fn scan_agency_dir(agency_dir: &Path, rules: &IgnoreRules) -> Vec<ScannedFile> {
    let walker = WalkDir::new(agency_dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_dir(e, rules));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Error accessing entry, skipping");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if rules.is_ignored(&file_name) {
            tracing::debug!(file = %entry.path().display(), "Ignored file");
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(agency_dir) else {
            continue;
        };
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let modified = match entry.metadata().map(|m| m.modified()) {
            Ok(Ok(modified)) => modified,
            _ => {
                tracing::warn!(file = %relative_path, "No modification time, using epoch");
                SystemTime::UNIX_EPOCH
            }
        };
        files.push(ScannedFile {
            relative_path,
            modified,
        });
    }
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    files
}

fn is_hidden_dir(entry: &DirEntry, rules: &IgnoreRules) -> bool {
    rules.skip_hidden
        && entry.file_type().is_dir()
        && entry.file_name().to_string_lossy().starts_with('.')
}
