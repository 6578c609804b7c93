//! The job: one directory's worth of test work.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tftest_core::artifacts::PROVIDER_FILE;

use super::error::{JobError, ProcessError};
use super::process::{self, CommandSpec, ProcessHandle, ProcessRegistry};
use super::sink::OutputSinks;
use super::terminate::{ProcessTreeKill, Terminator};

static NOT_EXECUTED: JobError = JobError::NotExecuted;

/// A discovered job.
///
/// Created once at discovery and shared (`Arc<Job>`) between its pipeline task, cleanup and the reporter. The
/// descriptor fields never change; the process registry and the terminal outcome use interior mutability, and the
/// outcome can be recorded exactly once.
#[derive(Debug)]
pub struct Job {
    pub name: String,
    pub root: PathBuf,
    pub dir: PathBuf,
    pub test_file: PathBuf,
    pub provider_file: PathBuf,
    /// Base `KEY=VALUE` environment; the pipeline adds the mock port on top.
    pub env: Vec<String>,
    pub sinks: OutputSinks,
    processes: ProcessRegistry,
    admitted: AtomicBool,
    outcome: OnceLock<Result<(), JobError>>,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        root: impl Into<PathBuf>,
        dir: impl Into<PathBuf>,
        test_file: impl Into<PathBuf>,
        env: Vec<String>,
        sinks: OutputSinks,
    ) -> Self {
        let dir = dir.into();
        Self {
            name: name.into(),
            root: root.into(),
            provider_file: dir.join(PROVIDER_FILE),
            dir,
            test_file: test_file.into(),
            env,
            sinks,
            processes: ProcessRegistry::default(),
            admitted: AtomicBool::new(false),
            outcome: OnceLock::new(),
        }
    }

    /// Start `program` in the job directory and register it for cleanup.
    ///
    /// If cleanup has already closed the registry the process is terminated on the spot.
    pub fn start_process(&self, program: &str, args: &[&str], env: &[String]) -> Result<ProcessHandle, ProcessError> {
        let spec = CommandSpec::new(program, &self.dir).args(args.iter().copied()).env(env);
        let handle = process::spawn(&spec, &self.name, &self.sinks)?;
        match self.processes.register(handle.clone()) {
            Ok(()) => Ok(handle),
            Err(orphan) => {
                if let Err(e) = ProcessTreeKill.terminate(&orphan) {
                    tracing::warn!(job = %self.name, program, error = %e, "failed to terminate late process");
                }
                Err(ProcessError::Cancelled {
                    program: program.to_string(),
                })
            }
        }
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    /// Record the terminal outcome. Later calls are ignored; the first outcome stands.
    pub fn record_outcome(&self, outcome: Result<(), JobError>) {
        if let Err(rejected) = self.outcome.set(outcome) {
            tracing::debug!(job = %self.name, outcome = ?rejected, "terminal outcome already recorded");
        }
    }

    /// Mark the job as let through the admission gate.
    pub fn mark_admitted(&self) {
        self.admitted.store(true, Ordering::SeqCst);
    }

    pub fn was_admitted(&self) -> bool {
        self.admitted.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// The terminal error, `None` on success. A job that never finished reports [`JobError::NotExecuted`].
    pub fn terminal_error(&self) -> Option<&JobError> {
        match self.outcome.get() {
            Some(Ok(())) => None,
            Some(Err(e)) => Some(e),
            None => Some(&NOT_EXECUTED),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::sink::MemorySink;

    fn job() -> Job {
        Job::new(
            "bucket",
            "/tmp/root",
            "/tmp/root/bucket",
            "/tmp/root/bucket/bucket_test.go",
            Vec::new(),
            OutputSinks::memory(&MemorySink::new()),
        )
    }

    #[test]
    fn test_provider_file_lives_in_job_dir() {
        let job = job();
        assert_eq!(job.provider_file, PathBuf::from("/tmp/root/bucket/provider.tf"));
    }

    #[test]
    fn test_unfinished_job_is_not_executed() {
        let job = job();
        assert!(!job.is_finished());
        assert!(matches!(job.terminal_error(), Some(JobError::NotExecuted)));
    }

    #[test]
    fn test_admission_is_tracked_separately_from_outcome() {
        let job = job();
        assert!(!job.was_admitted());
        job.mark_admitted();
        assert!(job.was_admitted());
        assert!(!job.is_finished());
    }

    #[test]
    fn test_first_outcome_wins() {
        let job = job();
        job.record_outcome(Ok(()));
        job.record_outcome(Err(JobError::Cancelled));
        assert!(job.terminal_error().is_none());
    }
}
