//! Group an agency's files by logical document.
//!
//! `letter.pdf`, `letter.ocr.pdf` and `letter.cleaned.csv` are one document
//! at different stages; they share the base name `letter`. Spreadsheets are
//! special: each sheet is exported to its own CSV (`report-Sheet1.csv`), so
//! the workbook joins every sheet group instead of forming its own.

use std::collections::BTreeMap;

use regex::Regex;

/// Multi-part extensions longer than this (dot included) stop the stripping,
/// so names like `Jan. 5 report.pdf` keep their tail.
const MAX_EXTENSION_LEN: usize = 5;

/// Long extensions that are still part of a stage suffix
/// (`.cleaned.csv`, `.rough.csv`, `.precleaned.csv`).
const LONG_EXTENSIONS: &[&str] = &[".complete", ".cleaned", ".precleaned", ".rough"];

const SPREADSHEET_EXTENSIONS: &[&str] = &[".xls", ".xlsx"];

/// Split a file name into its base and the full (possibly multi-part)
/// extension, e.g. `letter.cleaned.csv` -> (`letter`, `.cleaned.csv`).
/// Any directory part is kept on the base.
pub fn split_base_and_ext(path: &str) -> (&str, &str) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let mut base_end = path.len();

    loop {
        let name = &path[name_start..base_end];
        let Some(dot) = name.rfind('.') else { break };
        // A leading dot is part of the name, not an extension.
        if dot == 0 {
            break;
        }
        let ext = &name[dot..];
        if ext.len() > MAX_EXTENSION_LEN && !LONG_EXTENSIONS.contains(&ext) {
            break;
        }
        base_end = name_start + dot;
    }
    (&path[..base_end], &path[base_end..])
}

pub fn is_spreadsheet(path: &str) -> bool {
    let (_, ext) = split_base_and_ext(path);
    let lower = ext.to_lowercase();
    SPREADSHEET_EXTENSIONS.iter().any(|s| lower.ends_with(s))
}

/// Matches CSV exports of the sheets of the workbook with base `base`.
/// Capture 1 is the sheet name.
pub fn sheet_pattern(base: &str) -> Option<Regex> {
    let pattern = format!(r"^{}[-_](.+?)(?:\.[A-Za-z]+)*\.csv$", regex::escape(base));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(base, error = %e, "Could not build sheet pattern");
            None
        }
    }
}

/// Files grouped by base name. Both the keys and each group are sorted.
pub type FileGroups = BTreeMap<String, Vec<String>>;

/// Group relative paths by base name and fold spreadsheets into their sheet
/// groups.
pub fn group_files<S: AsRef<str>>(files: &[S]) -> FileGroups {
    let mut groups = FileGroups::new();
    for file in files {
        let file = file.as_ref();
        let (base, _) = split_base_and_ext(file);
        groups.entry(base.to_string()).or_default().push(file.to_string());
    }

    let mut folded: Vec<(String, String)> = Vec::new();
    let mut additions: Vec<(String, String)> = Vec::new();
    for (base, group) in &groups {
        for workbook in group.iter().filter(|f| is_spreadsheet(f)) {
            let Some(pattern) = sheet_pattern(base) else {
                continue;
            };
            for (other_base, other_group) in &groups {
                if other_base == base {
                    continue;
                }
                if other_group.iter().any(|f| pattern.is_match(f)) {
                    additions.push((other_base.clone(), workbook.clone()));
                    let entry = (base.clone(), workbook.clone());
                    if !folded.contains(&entry) {
                        folded.push(entry);
                    }
                }
            }
        }
    }

    for (target, workbook) in additions {
        if let Some(group) = groups.get_mut(&target) {
            if !group.contains(&workbook) {
                group.push(workbook);
            }
        }
    }
    // Only the workbook leaves its own group; siblings such as a whole-book
    // `report.csv` export stay.
    for (base, workbook) in &folded {
        tracing::debug!(workbook = %workbook, "Spreadsheet folded into its sheet groups");
        if let Some(group) = groups.get_mut(base) {
            group.retain(|f| f != workbook);
            if group.is_empty() {
                groups.remove(base);
            }
        }
    }
    for group in groups.values_mut() {
        group.sort();
    }
    groups
}
