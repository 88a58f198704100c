//! Blocking runner for configured command-line tools.
//!
//! A command line is a program plus argument templates. `{input}`,
//! `{output}` and `{pages}` are substituted per run; an argument that is
//! exactly `{pages}` is dropped when no page range is requested.
//!
//! Callers stay synchronous: each run drives the child on a current-thread
//! tokio runtime, racing it against the timeout and the [`CancelFlag`]. A
//! losing child is killed when its future is dropped.

use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::Command;

use super::{page_argument, OcrEngine, PageCounter, TextExtractor, ToolError};
use crate::models::PageSpan;

/// How often a running tool checks the cancel flag.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

const PAGES_PLACEHOLDER: &str = "{pages}";

/// Shared stop signal for long batches. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Values substituted into the argument templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct Placeholders<'a> {
    pub input: Option<&'a Path>,
    pub output: Option<&'a Path>,
    pub pages: Option<PageSpan>,
}

/// Raw result of a successful run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Stdout as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn stdout_text(&self, program: &str) -> String {
        match String::from_utf8(self.stdout.clone()) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!(program, "Tool output is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(&self.stdout).into_owned()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExternalTool {
    name: &'static str,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    cancel: CancelFlag,
}

impl ExternalTool {
    /// Build from a configured command line, e.g.
    /// `["ocrmypdf", "--force-ocr", "{input}", "{output}"]`.
    pub fn new(name: &'static str, command: &[String], timeout: Duration) -> Result<Self, ToolError> {
        let (program, args) = command.split_first().ok_or(ToolError::NotConfigured(name))?;
        if program.trim().is_empty() {
            return Err(ToolError::NotConfigured(name));
        }
        Ok(Self {
            name,
            program: program.clone(),
            args: args.to_vec(),
            timeout,
            cancel: CancelFlag::default(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Arguments after substitution.
    pub fn render_args(&self, values: &Placeholders<'_>) -> Vec<String> {
        let input = values.input.map(|p| p.to_string_lossy().into_owned());
        let output = values.output.map(|p| p.to_string_lossy().into_owned());
        let pages = values.pages.map(page_argument);

        self.args
            .iter()
            .filter(|arg| pages.is_some() || arg.as_str() != PAGES_PLACEHOLDER)
            .map(|arg| {
                let mut arg = arg.clone();
                if let Some(input) = &input {
                    arg = arg.replace("{input}", input);
                }
                if let Some(output) = &output {
                    arg = arg.replace("{output}", output);
                }
                if let Some(pages) = &pages {
                    arg = arg.replace(PAGES_PLACEHOLDER, pages);
                }
                arg
            })
            .collect()
    }

    /// Run to completion. Non-zero exit, timeout and cancellation are errors.
    pub fn run(&self, values: &Placeholders<'_>) -> Result<ToolOutput, ToolError> {
        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let args = self.render_args(values);
        tracing::debug!(tool = self.name, program = %self.program, ?args, "Running tool");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let started = Instant::now();
        let finished = runtime.block_on(self.run_child(&args))?;

        let output = ToolOutput {
            stdout: finished.stdout,
            stderr: finished.stderr,
        };
        if !finished.status.success() {
            return Err(ToolError::NonZeroExit {
                program: self.program.clone(),
                code: finished.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!(
            tool = self.name,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            "Tool finished"
        );
        Ok(output)
    }

    async fn run_child(&self, args: &[String]) -> Result<Output, ToolError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        tokio::select! {
            finished = tokio::time::timeout(self.timeout, child.wait_with_output()) => match finished {
                Ok(output) => Ok(output?),
                Err(_) => {
                    tracing::warn!(tool = self.name, secs = self.timeout.as_secs(), "Tool timed out");
                    Err(ToolError::Timeout {
                        program: self.program.clone(),
                        secs: self.timeout.as_secs(),
                    })
                }
            },
            () = cancelled(&self.cancel) => {
                tracing::info!(tool = self.name, "Tool run cancelled");
                Err(ToolError::Cancelled)
            }
        }
    }
}

/// Resolves once `flag` is raised.
async fn cancelled(flag: &CancelFlag) {
    let mut ticks = tokio::time::interval(CANCEL_CHECK_INTERVAL);
    while !flag.is_cancelled() {
        ticks.tick().await;
    }
}

impl OcrEngine for ExternalTool {
    fn ocr(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.run(&Placeholders {
            input: Some(input),
            output: Some(output),
            pages: None,
        })?;
        if !output.exists() {
            return Err(ToolError::InvalidOutput(format!(
                "{} produced no file at {}",
                self.program,
                output.display()
            )));
        }
        Ok(())
    }
}

impl TextExtractor for ExternalTool {
    fn extract_text(&self, pdf: &Path, pages: Option<PageSpan>) -> Result<String, ToolError> {
        let output = self.run(&Placeholders {
            input: Some(pdf),
            output: None,
            pages,
        })?;
        Ok(output.stdout_text(&self.program))
    }
}

impl PageCounter for ExternalTool {
    fn page_count(&self, pdf: &Path) -> Result<u32, ToolError> {
        let output = self.run(&Placeholders {
            input: Some(pdf),
            ..Default::default()
        })?;
        parse_page_count(&output.stdout_text(&self.program))
    }
}

/// Accepts either a bare number or `pdfinfo`-style `Pages: N` output.
pub fn parse_page_count(text: &str) -> Result<u32, ToolError> {
    if let Ok(n) = text.trim().parse::<u32>() {
        return Ok(n);
    }
    text.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|n| n.trim().parse().ok())
        .ok_or_else(|| ToolError::InvalidOutput(format!("no page count in {:?}", text.trim())))
}
