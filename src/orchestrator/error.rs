//! Error types for the orchestrator.
//!
//! Run-fatal errors ([`ConfigError`], [`DiscoveryError`]) surface from [`super::Orchestrator::run`]. Everything that
//! goes wrong inside one job becomes that job's [`JobError`] and is only ever shown by the reporter.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors caught before any job starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("a run configuration must be provided")]
    Missing,

    #[error("invalid environment override {0:?}: expected KEY=VALUE")]
    InvalidEnvOverride(String),
}

/// Errors while walking the root directory for jobs.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to resolve absolute path to {}: {source}", path.display())]
    Resolve { path: PathBuf, source: io::Error },

    #[error("failed to access path {}: {source}", path.display())]
    Walk { path: PathBuf, source: walkdir::Error },

    #[error("failed to list files in {}: {source}", path.display())]
    List { path: PathBuf, source: io::Error },

    #[error("invalid test file pattern {pattern:?}: {source}")]
    Pattern { pattern: String, source: glob::PatternError },
}

/// Errors from starting or waiting on a child process.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start process {program}: {source}")]
    Spawn { program: String, source: io::Error },

    #[error("failed to wait for {program}: {message}")]
    Wait { program: String, message: String },

    #[error("{program} exited with {}", describe_exit(.code))]
    Exit { program: String, code: Option<i32> },

    #[error("{program} started after the run was cancelled")]
    Cancelled { program: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// The two infra-tool steps a pipeline runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfraStep {
    Init,
    Apply,
}

impl InfraStep {
    pub fn args(self) -> &'static [&'static str] {
        match self {
            InfraStep::Init => &["init", "-no-color"],
            InfraStep::Apply => &["apply", "-auto-approve", "-no-color"],
        }
    }
}

impl fmt::Display for InfraStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfraStep::Init => write!(f, "init"),
            InfraStep::Apply => write!(f, "apply"),
        }
    }
}

/// Coarse classification of a job's terminal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Port, mock service, provider file or infra tool: the test never got a fair run.
    Infrastructure,
    /// The test binary itself failed.
    Test,
    Cancelled,
    NotExecuted,
}

/// A job's terminal error. Exactly one is recorded per job.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("failed to allocate a port: {0}")]
    PortAllocation(#[source] io::Error),

    #[error("failed to start the mock service: {0}")]
    MockStart(#[source] ProcessError),

    #[error("failed to write provider at {}: {source}", path.display())]
    ConfigWrite { path: PathBuf, source: io::Error },

    #[error("infra {step} failed: {source}")]
    Infra { step: InfraStep, source: ProcessError },

    #[error("test {} failed: {source}", test_file.display())]
    Test { test_file: PathBuf, source: ProcessError },

    #[error("job cancelled")]
    Cancelled,

    #[error("job task aborted: {0}")]
    Aborted(String),

    #[error("job not executed")]
    NotExecuted,
}

impl JobError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            JobError::Test { .. } => ErrorCategory::Test,
            JobError::Cancelled => ErrorCategory::Cancelled,
            JobError::NotExecuted => ErrorCategory::NotExecuted,
            JobError::PortAllocation(_)
            | JobError::MockStart(_)
            | JobError::ConfigWrite { .. }
            | JobError::Infra { .. }
            | JobError::Aborted(_) => ErrorCategory::Infrastructure,
        }
    }
}

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("job discovery did not complete: {0}")]
    DiscoveryTask(#[from] tokio::task::JoinError),

    #[error("failed to build the readiness probe client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("failed to write the job report: {0}")]
    Report(#[source] io::Error),
}
