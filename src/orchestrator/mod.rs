//! Job orchestration.
//!
//! A run discovers one job per directory holding a test file, pushes every job through its [`pipeline`] with at
//! most N pipelines in flight, tears each job down, and reports.
//!
//! ## Modules
//!
//! - `discovery` - find jobs under the root directory
//! - `pipeline` - the per-job stage sequence behind the [`JobRunner`] seam
//! - `scheduler` - bounded admission of jobs
//! - `process`, `sink`, `terminate` - child processes, their output, and killing them
//! - `port`, `probe` - mock-service port allocation and readiness
//! - `cleanup` - process termination and artifact removal
//! - `shutdown` - interrupt watching
//! - `report` - outcomes and the results table
//!
//! ## Interruption
//!
//! When the shutdown future passed to [`Orchestrator::run`] resolves, no further job is admitted, every job's live
//! processes are killed, and in-flight pipelines get a bounded grace period to return. A pipeline still running when
//! the grace period ends is abandoned and its job reported as cancelled. Cleanup and reporting then happen as usual;
//! jobs that were never admitted are reported as not executed.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod cleanup;
pub mod discovery;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod port;
pub mod probe;
pub mod process;
pub mod report;
pub mod scheduler;
pub mod shutdown;
pub mod sink;
pub mod terminate;

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use cleanup::Cleanup;
pub use error::{ErrorCategory, JobError, OrchestratorError};
pub use job::Job;
pub use pipeline::{JobRunner, Pipeline};
pub use report::{ConsoleReporter, JobOutcome, JobReporter, RunReport};
pub use scheduler::Scheduler;
pub use sink::{LineSink, MemorySink, OutputSinks};
pub use terminate::{ProcessTreeKill, Terminator};

use crate::config::NormalizedConfig;

/// One orchestrated run over a root directory.
pub struct Orchestrator {
    config: NormalizedConfig,
    sinks: OutputSinks,
    runner: Option<Arc<dyn JobRunner>>,
    capacity: Option<usize>,
    terminator: Arc<dyn Terminator>,
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: NormalizedConfig) -> Self {
        Self {
            config,
            sinks: OutputSinks::default(),
            runner: None,
            capacity: None,
            terminator: Arc::new(ProcessTreeKill),
            cancel: CancellationToken::new(),
        }
    }

    /// Where relayed child output goes. Defaults to the console.
    pub fn with_sinks(mut self, sinks: OutputSinks) -> Self {
        self.sinks = sinks;
        self
    }

    /// Replace the real pipeline.
    pub fn with_runner(mut self, runner: Arc<dyn JobRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Override the admission-gate capacity, normally `NumCPUs × JobsPerCPU`.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// The token cancelled when the run is interrupted. Custom runners can watch it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &NormalizedConfig {
        &self.config
    }

    /// Discover, run, clean up and report.
    ///
    /// `shutdown` is raced against the natural end of the run; the CLI passes
    /// [`shutdown::wait_for_interrupt`].
    ///
    /// ## Errors
    /// Only run-fatal problems: discovery failure (including a panicked walk), the probe client failing to build, or
    /// the reporter failing to write. Job failures are part of the returned [`RunReport`].
    pub async fn run<F>(self, reporter: &mut dyn JobReporter, shutdown: F) -> Result<RunReport, OrchestratorError>
    where
        F: Future<Output = ()>,
    {
        let Self {
            config,
            sinks,
            runner,
            capacity,
            terminator,
            cancel,
        } = self;

        // the walk is synchronous filesystem work; keep it off the runtime workers
        let jobs = {
            let (root, pattern, env) = (config.root.clone(), config.toolchain.test_pattern.clone(), config.env.clone());
            tokio::task::spawn_blocking(move || discovery::discover(&root, &pattern, &env, &sinks)).await??
        };
        reporter.on_jobs_discovered(jobs.len());

        let runner: Arc<dyn JobRunner> = match runner {
            Some(runner) => runner,
            None => Arc::new(Pipeline::new(&config, cancel.clone())?.with_terminator(Arc::clone(&terminator))),
        };
        let scheduler = Scheduler::new(capacity.unwrap_or_else(|| config.max_in_flight()));
        let cleanup = Cleanup::with_terminator(config.cleanup, terminator);
        tracing::info!(
            jobs = jobs.len(),
            capacity = scheduler.capacity(),
            root = %config.root.display(),
            "starting run"
        );

        {
            let schedule = scheduler.run(&jobs, runner, &cancel);
            tokio::pin!(schedule);
            tokio::pin!(shutdown);

            tokio::select! {
                () = &mut schedule => {}
                () = &mut shutdown => {
                    cancel.cancel();
                    for job in &jobs {
                        cleanup.terminate_processes(job);
                    }
                    let grace = config.cleanup.shutdown_grace;
                    if tokio::time::timeout(grace, &mut schedule).await.is_err() {
                        tracing::warn!(?grace, "in-flight jobs did not stop in time; abandoning them");
                    }
                }
            }
        }

        for job in jobs.iter().filter(|job| job.was_admitted() && !job.is_finished()) {
            tracing::debug!(job = %job.name, "abandoned job recorded as cancelled");
            job.record_outcome(Err(JobError::Cancelled));
        }

        for job in &jobs {
            cleanup.clean(job).await;
        }

        let report = RunReport::from_jobs(&jobs);
        reporter.on_run_complete(&report).map_err(OrchestratorError::Report)?;
        Ok(report)
    }
}
