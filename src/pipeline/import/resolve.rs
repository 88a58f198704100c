use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::grouping::{is_spreadsheet, sheet_pattern, split_base_and_ext};
use super::scan::ScannedFile;
use crate::models::Status;
use crate::status;

/// `-p<start>[-<end>]` page-range marker before the extensions of a file
/// split out of a larger PDF.
static PAGE_SEGMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-p(\d+(?:-\d+)?)((?:\.[A-Za-z]+)+)$").expect("valid regex")
});

/// How one file group maps onto a document and its artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupResolution {
    /// Stage of the most processed file.
    pub status: Status,
    /// The most processed file.
    pub current: String,
    /// The file the agency sent; becomes the Document.
    pub original: String,
    /// Everything except the original; each becomes an artifact.
    pub artifacts: Vec<String>,
    pub source_page: Option<String>,
    pub source_sheet: Option<String>,
}

/// Page range and the original PDF of a page-segment file, e.g.
/// `case123-p4-9.ocr.pdf` -> (`case123.pdf`, `4-9`).
pub fn page_segment(path: &str) -> Option<(String, String)> {
    let caps = PAGE_SEGMENT_RE.captures(path)?;
    let whole = caps.get(0)?;
    let pages = caps.get(1)?.as_str().to_string();
    Some((format!("{}.pdf", &path[..whole.start()]), pages))
}

/// Sheet name of a CSV exported from `workbook`, if it is one.
pub fn sheet_name(workbook: &str, csv: &str) -> Option<String> {
    let (base, _) = split_base_and_ext(workbook);
    let caps = sheet_pattern(base)?.captures(csv)?;
    Some(caps.get(1)?.as_str().to_string())
}

/// Pick the current and original file of a group.
///
/// Current is the file the classifier scores lowest (first in path order on
/// ties). Original is the workbook for a folded spreadsheet group, otherwise
/// the oldest file (first in path order on ties). A page-segment current file
/// points at its source PDF instead, which need not be in the group.
pub fn resolve_group(files: &[&ScannedFile]) -> Option<GroupResolution> {
    let mut sorted: Vec<&ScannedFile> = files.to_vec();
    sorted.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let current = sorted
        .iter()
        .min_by_key(|f| status::score_filename(&f.relative_path))?
        .relative_path
        .clone();

    let workbook = sorted.iter().find(|f| {
        is_spreadsheet(&f.relative_path)
            && sorted
                .iter()
                .any(|other| sheet_name(&f.relative_path, &other.relative_path).is_some())
    });

    let mut original = match workbook {
        Some(workbook) => workbook.relative_path.clone(),
        None => sorted
            .iter()
            .min_by(|a, b| {
                a.modified
                    .cmp(&b.modified)
                    .then_with(|| a.relative_path.cmp(&b.relative_path))
            })?
            .relative_path
            .clone(),
    };

    let mut source_page = None;
    if let Some((pdf, pages)) = page_segment(&current) {
        original = pdf;
        source_page = Some(pages);
    }

    let source_sheet = if is_spreadsheet(&original) {
        sheet_name(&original, &current)
    } else {
        None
    };

    let artifacts = sorted
        .iter()
        .map(|f| f.relative_path.clone())
        .filter(|path| *path != original)
        .collect();

    Some(GroupResolution {
        status: status::classify(&current),
        current,
        original,
        artifacts,
        source_page,
        source_sheet,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn files(names: &[&str]) -> Vec<ScannedFile> {
        // Oldest first.
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ScannedFile {
                relative_path: name.to_string(),
                modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_000 + i as u64),
            })
            .collect()
    }

    fn resolve(names: &[&str]) -> GroupResolution {
        let files = files(names);
        let refs: Vec<&ScannedFile> = files.iter().collect();
        resolve_group(&refs).unwrap()
    }

    #[test]
    fn original_is_oldest_and_current_most_processed() {
        let r = resolve(&["letter.pdf", "letter.eml", "letter.cleaned.csv"]);
        assert_eq!(r.original, "letter.pdf");
        assert_eq!(r.current, "letter.cleaned.csv");
        assert_eq!(r.status, Status::Complete);
        assert_eq!(r.artifacts, vec!["letter.cleaned.csv", "letter.eml"]);
        assert!(r.source_page.is_none());
        assert!(r.source_sheet.is_none());
    }

    #[test]
    fn single_file_group_has_no_artifacts() {
        let r = resolve(&["memo.msg"]);
        assert_eq!(r.original, "memo.msg");
        assert_eq!(r.current, "memo.msg");
        assert_eq!(r.status, Status::AwaitingReading);
        assert!(r.artifacts.is_empty());
    }

    #[test]
    fn page_segment_recovers_original_pdf() {
        let r = resolve(&["case123-p4-9.ocr.pdf"]);
        assert_eq!(r.original, "case123.pdf");
        assert_eq!(r.source_page.as_deref(), Some("4-9"));
        assert_eq!(r.status, Status::AwaitingCsv);
        assert_eq!(r.artifacts, vec!["case123-p4-9.ocr.pdf"]);
    }

    #[test]
    fn single_page_segment() {
        assert_eq!(
            page_segment("2020/case-p12.csv"),
            Some(("2020/case.pdf".to_string(), "12".to_string()))
        );
        assert_eq!(page_segment("case.pdf"), None);
        assert_eq!(page_segment("case-pages.pdf"), None);
    }

    #[test]
    fn sheet_groups_share_the_workbook() {
        let sheet1 = resolve(&["report.xlsx", "report-Sheet1.csv"]);
        let sheet2 = resolve(&["report.xlsx", "report-Sheet2.csv"]);
        assert_eq!(sheet1.original, "report.xlsx");
        assert_eq!(sheet2.original, "report.xlsx");
        assert_eq!(sheet1.source_sheet.as_deref(), Some("Sheet1"));
        assert_eq!(sheet2.source_sheet.as_deref(), Some("Sheet2"));
        assert_eq!(sheet1.artifacts, vec!["report-Sheet1.csv"]);
        assert_eq!(sheet1.status, Status::AwaitingCleaning);
    }

    #[test]
    fn workbook_is_original_even_when_newer() {
        let r = resolve(&["report-Sheet1.csv", "report.xlsx"]);
        assert_eq!(r.original, "report.xlsx");
    }

    #[test]
    fn mtime_ties_break_on_name() {
        let same = SystemTime::UNIX_EPOCH;
        let a = ScannedFile {
            relative_path: "b.pdf".into(),
            modified: same,
        };
        let b = ScannedFile {
            relative_path: "b.eml".into(),
            modified: same,
        };
        let r = resolve_group(&[&a, &b]).unwrap();
        assert_eq!(r.original, "b.eml");
        assert_eq!(r.current, "b.eml");
    }

    #[test]
    fn empty_group_resolves_to_nothing() {
        assert!(resolve_group(&[]).is_none());
    }
}
