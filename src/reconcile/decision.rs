use serde::Serialize;

use crate::models::{Document, ProcessedDocument, Status};

/// Why reconciliation left a document alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The document has no artifacts to derive a status from.
    NoArtifacts,
    /// `no_new_records` is set and the status is already complete.
    NoNewRecords,
    /// The current status is one recomputation never overrides.
    Sticky(Status),
    /// The artifact has no parent document.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusDecision {
    /// Recomputation agrees with the stored status.
    Unchanged,
    Skipped(SkipReason),
    /// The document must move to this status.
    Set(Status),
}

impl StatusDecision {
    /// The status the document should end up with, if it changes.
    pub fn new_status(&self) -> Option<Status> {
        match self {
            Self::Set(status) => Some(*status),
            _ => None,
        }
    }
}

/// The most complete artifact. Ties on score go to the smallest file path,
/// then the smallest id, so the choice never depends on load order.
pub fn best_artifact(artifacts: &[ProcessedDocument]) -> Option<&ProcessedDocument> {
    artifacts
        .iter()
        .min_by(|a, b| {
            a.score()
                .cmp(&b.score())
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Decide what a document's status should be.
///
/// In order:
/// 1. `no_new_records` forces complete and freezes the document.
/// 2. Without artifacts there is nothing to derive from.
/// 3. Sticky statuses are left alone.
/// 4. A completed merge touching the document forces complete.
/// 5. Otherwise the document takes the status of its best artifact.
pub fn decide_document_status(
    doc: &Document,
    artifacts: &[ProcessedDocument],
    has_completed_merge: bool,
) -> StatusDecision {
    if doc.no_new_records {
        return if doc.status == Status::Complete {
            StatusDecision::Skipped(SkipReason::NoNewRecords)
        } else {
            StatusDecision::Set(Status::Complete)
        };
    }

    let Some(best) = best_artifact(artifacts) else {
        return StatusDecision::Skipped(SkipReason::NoArtifacts);
    };

    if doc.status.is_sticky() {
        return StatusDecision::Skipped(SkipReason::Sticky(doc.status));
    }

    let target = if has_completed_merge {
        Status::Complete
    } else {
        best.status
    };

    if target == doc.status {
        StatusDecision::Unchanged
    } else {
        StatusDecision::Set(target)
    }
}

/// Status a document ends up with once `decision` is applied.
pub fn resulting_status(doc: &Document, decision: StatusDecision) -> Status {
    decision.new_status().unwrap_or(doc.status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(status: Status) -> Document {
        let mut doc = Document::new(None, "agency_attachments/Kent/letter.pdf");
        doc.status = status;
        doc
    }

    fn artifacts(files: &[&str]) -> Vec<ProcessedDocument> {
        files.iter().map(|f| ProcessedDocument::new(None, *f)).collect()
    }

    #[test]
    fn takes_best_artifact_status() {
        let arts = artifacts(&["letter.eml", "letter.ocr.pdf", "letter.csv"]);
        assert_eq!(
            decide_document_status(&doc(Status::Unchecked), &arts, false),
            StatusDecision::Set(Status::AwaitingCleaning)
        );
    }

    #[test]
    fn no_artifacts_is_skipped() {
        assert_eq!(
            decide_document_status(&doc(Status::Unchecked), &[], true),
            StatusDecision::Skipped(SkipReason::NoArtifacts)
        );
    }

    #[test]
    fn sticky_statuses_are_not_recomputed() {
        let arts = artifacts(&["letter.eml"]);
        for status in [
            Status::Complete,
            Status::CaseDoc,
            Status::SupportingDocument,
            Status::NonRequest,
        ] {
            assert_eq!(
                decide_document_status(&doc(status), &arts, false),
                StatusDecision::Skipped(SkipReason::Sticky(status))
            );
        }
    }

    #[test]
    fn no_new_records_forces_complete() {
        let mut d = doc(Status::AwaitingReading);
        d.no_new_records = true;
        let arts = artifacts(&["letter.msg"]);
        assert_eq!(
            decide_document_status(&d, &arts, false),
            StatusDecision::Set(Status::Complete)
        );
        d.status = Status::Complete;
        assert_eq!(
            decide_document_status(&d, &arts, false),
            StatusDecision::Skipped(SkipReason::NoNewRecords)
        );
    }

    #[test]
    fn completed_merge_forces_complete() {
        let arts = artifacts(&["letter.eml"]);
        assert_eq!(
            decide_document_status(&doc(Status::AwaitingExtraction), &arts, true),
            StatusDecision::Set(Status::Complete)
        );
    }

    #[test]
    fn matching_status_is_unchanged() {
        let arts = artifacts(&["letter.ocr.pdf"]);
        assert_eq!(
            decide_document_status(&doc(Status::AwaitingCsv), &arts, false),
            StatusDecision::Unchanged
        );
    }

    #[test]
    fn applying_a_decision_reaches_a_fixed_point() {
        let arts = artifacts(&["letter.rough.csv", "letter.msg"]);
        let mut d = doc(Status::Unchecked);
        let first = decide_document_status(&d, &arts, false);
        d.status = resulting_status(&d, first);
        assert_eq!(d.status, Status::AwaitingReading);
        assert_eq!(
            decide_document_status(&d, &arts, false),
            StatusDecision::Unchanged
        );
    }

    #[test]
    fn tie_break_prefers_smallest_path() {
        let arts = artifacts(&["b/letter.csv", "a/letter.txt", "c/letter.csv"]);
        assert_eq!(best_artifact(&arts).unwrap().file, "a/letter.txt");

        let mut reversed = arts.clone();
        reversed.reverse();
        assert_eq!(best_artifact(&reversed).unwrap().file, "a/letter.txt");
    }

    #[test]
    fn tie_break_falls_back_to_id() {
        let a = ProcessedDocument::new(None, "same.csv");
        let b = ProcessedDocument::new(None, "same.csv");
        let expected = a.id.min(b.id);
        assert_eq!(best_artifact(&[a.clone(), b.clone()]).unwrap().id, expected);
        assert_eq!(best_artifact(&[b, a]).unwrap().id, expected);
    }
}
