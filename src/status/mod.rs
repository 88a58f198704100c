//! Status classifier and score table.
//!
//! Both are views over one ordered rule list, built once per process and
//! never mutated. Score 0 is "complete"; a higher score means more work
//! remains before the file is done.

mod rules;

pub use rules::StatusRule;

use std::sync::LazyLock;

use crate::models::enums::Status;

/// Bumped whenever a stage is added, removed or reordered.
pub const STATUS_TABLE_VERSION: u32 = 2;

/// The ordered rule list plus the score lookup derived from it.
pub struct StatusTable {
    rules: Vec<StatusRule>,
    scores: Vec<(Status, usize)>,
}

impl StatusTable {
    fn from_rules(rules: Vec<StatusRule>) -> Self {
        let scores = rules
            .iter()
            .enumerate()
            .map(|(position, rule)| (rule.status, position))
            .collect();
        Self { rules, scores }
    }

    /// First matching stage for a filename. The catch-all rule guarantees a
    /// result for any input.
    pub fn classify(&self, filename: &str) -> Status {
        self.rules
            .iter()
            .find(|rule| rule.matches(filename))
            .map(|rule| rule.status)
            .unwrap_or(Status::Unchecked)
    }

    /// Position of a stage in the rule list.
    pub fn score(&self, status: Status) -> usize {
        self.scores
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, score)| *score)
            .unwrap_or(self.rules.len())
    }

    /// Stages in score order.
    pub fn statuses(&self) -> impl Iterator<Item = Status> + '_ {
        self.rules.iter().map(|rule| rule.status)
    }

    pub fn rules(&self) -> &[StatusRule] {
        &self.rules
    }
}

static STATUS_TABLE: LazyLock<StatusTable> =
    LazyLock::new(|| StatusTable::from_rules(rules::standard_rules()));

/// The process-wide status table.
pub fn table() -> &'static StatusTable {
    &STATUS_TABLE
}

/// Classify a filename into a processing stage. Pure; the file need not exist.
pub fn classify(filename: &str) -> Status {
    STATUS_TABLE.classify(filename)
}

pub fn score(status: Status) -> usize {
    STATUS_TABLE.score(status)
}

/// Score of the stage a filename classifies into.
pub fn score_filename(filename: &str) -> usize {
    score(classify(filename))
}

/// True when `a` is strictly further along than `b`.
pub fn is_more_complete(a: Status, b: Status) -> bool {
    score(a) < score(b)
}
