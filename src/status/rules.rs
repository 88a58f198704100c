//! Filename predicates for each processing stage.
//!
//! Listed from most to least complete. A rule's position is its score, so
//! inserting a stage here also places it in the score order.

use crate::models::enums::Status;

/// One classification rule: a stage and the filename test that selects it.
pub struct StatusRule {
    pub status: Status,
    matches: fn(&str) -> bool,
}

impl StatusRule {
    pub fn matches(&self, filename: &str) -> bool {
        (self.matches)(filename)
    }
}

fn is_complete(n: &str) -> bool {
    n.ends_with(".cleaned.csv") || n.ends_with(".complete.csv")
}

fn is_awaiting_cleaning(n: &str) -> bool {
    (n.ends_with(".csv") && !n.ends_with(".rough.csv") && !n.ends_with(".auto.csv"))
        || n.ends_with(".txt")
}

fn is_awaiting_csv(n: &str) -> bool {
    n.ends_with(".ocr.pdf")
}

fn is_auto_extracted(n: &str) -> bool {
    n.ends_with(".auto.csv")
}

fn is_awaiting_reading(n: &str) -> bool {
    n.ends_with(".msg")
}

fn is_awaiting_extraction(n: &str) -> bool {
    n.ends_with(".eml") || n.ends_with(".rough.csv")
}

/// Manual-only stages hold a score position but never match a filename.
fn never(_: &str) -> bool {
    false
}

fn always(_: &str) -> bool {
    true
}

pub(super) fn standard_rules() -> Vec<StatusRule> {
    vec![
        StatusRule { status: Status::Complete, matches: is_complete },
        StatusRule { status: Status::AwaitingCleaning, matches: is_awaiting_cleaning },
        StatusRule { status: Status::AwaitingCsv, matches: is_awaiting_csv },
        StatusRule { status: Status::AutoExtracted, matches: is_auto_extracted },
        StatusRule { status: Status::AwaitingReading, matches: is_awaiting_reading },
        StatusRule { status: Status::AwaitingExtraction, matches: is_awaiting_extraction },
        StatusRule { status: Status::SupportingDocument, matches: never },
        StatusRule { status: Status::CaseDoc, matches: never },
        StatusRule { status: Status::NonRequest, matches: never },
        StatusRule { status: Status::ExemptionLog, matches: never },
        StatusRule { status: Status::Unchecked, matches: always },
    ]
}
