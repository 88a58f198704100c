//! Decisions the new-file importer cannot make on its own.
//!
//! The automatic branch (exactly one candidate parent, an unambiguous file
//! type) never reaches the strategy. Everything else is delegated: an
//! interactive prompt for operators, a fixed answer table for scripted runs
//! and tests, or a strategy that simply declines.

use std::collections::HashMap;
use std::io::{BufRead, Write};

use crate::models::Document;

/// What kind of record a new file becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Derived output; needs a parent document.
    Processed,
    /// An original file sent by the agency.
    Responsive,
}

/// Answer to "which document is this file derived from?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentAnswer {
    /// Leave the file unresolved.
    Skip,
    /// Index into the candidate list.
    Candidate(usize),
    /// Storage path of the parent document within the same agency.
    File(String),
}

pub trait ImportStrategy {
    /// Whether to create an agency that is not in the database yet.
    fn approve_agency(&mut self, agency: &str, files: &[String]) -> bool;

    /// Type of a file the importer could not classify. `None` skips it.
    fn classify(&mut self, file: &str) -> Option<FileKind>;

    /// Parent of a processed file when zero or several candidates match.
    fn choose_parent(&mut self, file: &str, candidates: &[Document]) -> ParentAnswer;
}

/// Declines every decision. Ambiguous files end up in the unresolved list.
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipUnresolved;

impl ImportStrategy for SkipUnresolved {
    fn approve_agency(&mut self, _agency: &str, _files: &[String]) -> bool {
        false
    }

    fn classify(&mut self, _file: &str) -> Option<FileKind> {
        None
    }

    fn choose_parent(&mut self, _file: &str, _candidates: &[Document]) -> ParentAnswer {
        ParentAnswer::Skip
    }
}

/// Pre-recorded answers keyed by agency name or file path. Anything not in
/// the table is declined.
#[derive(Debug, Default, Clone)]
pub struct FixedAnswers {
    pub agencies: Vec<String>,
    pub kinds: HashMap<String, FileKind>,
    pub parents: HashMap<String, ParentAnswer>,
}

impl ImportStrategy for FixedAnswers {
    fn approve_agency(&mut self, agency: &str, _files: &[String]) -> bool {
        self.agencies.iter().any(|a| a == agency)
    }

    fn classify(&mut self, file: &str) -> Option<FileKind> {
        self.kinds.get(file).copied()
    }

    fn choose_parent(&mut self, file: &str, _candidates: &[Document]) -> ParentAnswer {
        self.parents.get(file).cloned().unwrap_or(ParentAnswer::Skip)
    }
}

/// Asks an operator line by line. Unparseable answers count as "skip".
pub struct PromptStrategy<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptStrategy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, question: &str) -> String {
        if write!(self.output, "{question} ").and_then(|_| self.output.flush()).is_err() {
            return String::new();
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(_) => line.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read answer, skipping");
                String::new()
            }
        }
    }

    fn say(&mut self, line: &str) {
        // Prompt output is best effort.
        let _ = writeln!(self.output, "{line}");
    }
}

impl<R: BufRead, W: Write> ImportStrategy for PromptStrategy<R, W> {
    fn approve_agency(&mut self, agency: &str, files: &[String]) -> bool {
        self.say(&format!("Agency '{agency}' doesn't exist. New files:"));
        for file in files {
            self.say(&format!("  - {file}"));
        }
        self.ask(&format!("Create '{agency}'? (y/n)")).eq_ignore_ascii_case("y")
    }

    fn classify(&mut self, file: &str) -> Option<FileKind> {
        self.say(&format!("Can't tell what type of file this is: {file}"));
        match self
            .ask("What type is it? (p)rocessed, (d)ocument or (s)kip")
            .to_lowercase()
            .as_str()
        {
            "p" => Some(FileKind::Processed),
            "d" => Some(FileKind::Responsive),
            _ => None,
        }
    }

    fn choose_parent(&mut self, file: &str, candidates: &[Document]) -> ParentAnswer {
        if candidates.is_empty() {
            self.say(&format!("No parent found for {file}"));
            let answer = self.ask("Enter the file of the parent (s to skip):");
            return match answer.as_str() {
                "" | "s" => ParentAnswer::Skip,
                path => ParentAnswer::File(path.to_string()),
            };
        }

        self.say(&format!("Possible parents for {file}:"));
        for (ix, doc) in candidates.iter().enumerate() {
            self.say(&format!("  {ix} {}", doc.file));
        }
        match self.ask("Which file is the parent? (number, s to skip)").parse::<usize>() {
            Ok(ix) if ix < candidates.len() => ParentAnswer::Candidate(ix),
            _ => ParentAnswer::Skip,
        }
    }
}
