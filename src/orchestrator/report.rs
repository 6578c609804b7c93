//! The end-of-run job report.

use std::io::{self, Write};
use std::sync::Arc;

use super::error::ErrorCategory;
use super::job::Job;

/// One job's row in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub name: String,
    /// Rendered terminal error; `None` means the job succeeded.
    pub error: Option<String>,
    pub category: Option<ErrorCategory>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a whole run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn from_jobs(jobs: &[Arc<Job>]) -> Self {
        let outcomes = jobs
            .iter()
            .map(|job| {
                let error = job.terminal_error();
                JobOutcome {
                    name: job.name.clone(),
                    error: error.map(ToString::to_string),
                    category: error.map(|e| e.category()),
                }
            })
            .collect();
        Self { outcomes }
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    /// `0` when every job succeeded, `1` otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.has_failures())
    }

    pub fn get(&self, name: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Receives run progress. Implement this for custom output formats.
pub trait JobReporter {
    /// Called once discovery has produced the job list.
    fn on_jobs_discovered(&mut self, _count: usize) {}

    /// Called after cleanup with the final outcome of every job.
    fn on_run_complete(&mut self, report: &RunReport) -> io::Result<()>;
}

/// Plain-text reporter writing the results table.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> JobReporter for ConsoleReporter<W> {
    fn on_jobs_discovered(&mut self, count: usize) {
        tracing::info!(jobs = count, "discovered jobs");
    }

    fn on_run_complete(&mut self, report: &RunReport) -> io::Result<()> {
        write!(self.out, "\n\n\n\n===== Job Results =====\n")?;
        for outcome in &report.outcomes {
            match &outcome.error {
                Some(err) => writeln!(self.out, "{:<20}{:<15}{}", outcome.name, "FAILED", err)?,
                None => writeln!(self.out, "{:<20}{:<15}", outcome.name, "SUCCESS")?,
            }
        }
        writeln!(self.out, "\n{} passed, {} failed", report.passed(), report.failed())?;
        self.out.flush()
    }
}
