//! The per-job pipeline.
//!
//! Strictly linear: port, mock service, provider file, readiness, infra init, infra apply, test. The mock service
//! keeps running in the background; every other stage is awaited before the next one starts. The first failing
//! stage ends the pipeline and becomes the job's terminal error.
//!
//! Whatever the outcome, the mock service is killed and reaped before the pipeline returns, so a job never holds a
//! mock past its own slot in the scheduler.

use std::fmt;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use tftest_core::artifacts::endpoint_url;
use tftest_core::env::{self, MOTO_PORT};
use tftest_core::render_provider;

use super::error::{InfraStep, JobError};
use super::job::Job;
use super::port::PortAllocator;
use super::probe::{Readiness, ReadinessProbe};
use super::process::ProcessHandle;
use super::terminate::{ProcessTreeKill, Terminator};
use crate::config::{NormalizedConfig, Toolchain};

/// How long to wait for a killed mock service to be reaped.
const MOCK_REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs one job to its terminal outcome.
///
/// The scheduler only depends on this seam, so tests can swap in runners that never start a process.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &Job) -> Result<(), JobError>;
}

/// Pipeline stages, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Port,
    Mock,
    Provider,
    Ready,
    Infra(InfraStep),
    Test,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Port => write!(f, "port"),
            Stage::Mock => write!(f, "mock"),
            Stage::Provider => write!(f, "provider"),
            Stage::Ready => write!(f, "ready"),
            Stage::Infra(step) => write!(f, "infra {step}"),
            Stage::Test => write!(f, "test"),
        }
    }
}

/// The real pipeline: mock service, infra tool and test runner.
pub struct Pipeline {
    ports: PortAllocator,
    probe: ReadinessProbe,
    toolchain: Toolchain,
    services: Vec<String>,
    terminator: Arc<dyn Terminator>,
    cancel: CancellationToken,
}

impl Pipeline {
    pub fn new(config: &NormalizedConfig, cancel: CancellationToken) -> Result<Self, reqwest::Error> {
        Ok(Self {
            ports: PortAllocator::new(),
            probe: ReadinessProbe::new(config.probe)?,
            toolchain: config.toolchain.clone(),
            services: config.services.clone(),
            terminator: Arc::new(ProcessTreeKill),
            cancel,
        })
    }

    /// Replace how the mock service is killed at the end of the job.
    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Refuse to enter `stage` once the run has been cancelled.
    fn enter(&self, job: &Job, stage: Stage) -> Result<(), JobError> {
        if self.cancel.is_cancelled() {
            tracing::debug!(job = %job.name, %stage, "run cancelled; stage skipped");
            return Err(JobError::Cancelled);
        }
        tracing::debug!(job = %job.name, %stage, "entering stage");
        Ok(())
    }

    /// A stage that failed because cleanup killed its process is a cancellation, not a failure.
    fn settle(&self, err: JobError) -> JobError {
        if self.cancel.is_cancelled() { JobError::Cancelled } else { err }
    }

    /// Kill the mock service and wait for it to be reaped. The handle stays registered for end-of-run cleanup.
    async fn stop_mock(&self, job: &Job, mock: &ProcessHandle) {
        if mock.has_exited() {
            return;
        }
        if let Err(e) = self.terminator.terminate(mock) {
            tracing::warn!(job = %job.name, program = mock.program(), error = %e, "failed to stop mock service");
            return;
        }
        if tokio::time::timeout(MOCK_REAP_TIMEOUT, mock.wait()).await.is_err() {
            tracing::warn!(job = %job.name, program = mock.program(), "mock service did not exit after kill");
        } else {
            tracing::debug!(job = %job.name, "mock service stopped");
        }
    }

    async fn run_stages(&self, job: &Job, mock: &mut Option<ProcessHandle>) -> Result<(), JobError> {
        self.enter(job, Stage::Port)?;
        let port = self.ports.allocate().map_err(JobError::PortAllocation)?;
        let port_arg = port.to_string();

        let mut env = job.env.clone();
        env.push(env::entry(MOTO_PORT, &port_arg));

        self.enter(job, Stage::Mock)?;
        *mock = Some(
            job.start_process(&self.toolchain.mock_command, &["-p", port_arg.as_str()], &env)
                .map_err(JobError::MockStart)?,
        );

        self.enter(job, Stage::Provider)?;
        write_provider(&job.provider_file, &render_provider(&self.services, port))
            .await
            .map_err(|source| JobError::ConfigWrite {
                path: job.provider_file.clone(),
                source,
            })?;

        self.enter(job, Stage::Ready)?;
        let url = endpoint_url(port);
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(JobError::Cancelled),
            readiness = self.probe.wait_until_ready(&job.name, &url) => {
                if let Readiness::Ready { attempt } = readiness {
                    tracing::info!(job = %job.name, port, attempt, "mock service is ready");
                }
            }
        }

        for step in [InfraStep::Init, InfraStep::Apply] {
            self.enter(job, Stage::Infra(step))?;
            let infra = job
                .start_process(&self.toolchain.infra_command, step.args(), &env)
                .map_err(|source| JobError::Infra { step, source })?;
            infra.success().await.map_err(|source| JobError::Infra { step, source })?;
        }

        self.enter(job, Stage::Test)?;
        let test_file = job.test_file.to_string_lossy();
        let mut args: Vec<&str> = self.toolchain.test_args.iter().map(String::as_str).collect();
        args.push(&test_file);
        let test = job
            .start_process(&self.toolchain.test_command, &args, &env)
            .map_err(|source| JobError::Test {
                test_file: job.test_file.clone(),
                source,
            })?;
        test.success().await.map_err(|source| JobError::Test {
            test_file: job.test_file.clone(),
            source,
        })
    }
}

#[async_trait]
impl JobRunner for Pipeline {
    async fn run(&self, job: &Job) -> Result<(), JobError> {
        let mut mock = None;
        let result = self.run_stages(job, &mut mock).await.map_err(|e| self.settle(e));
        if let Some(mock) = &mock {
            self.stop_mock(job, mock).await;
        }
        match &result {
            Ok(()) => tracing::info!(job = %job.name, "job succeeded"),
            Err(e) => tracing::info!(job = %job.name, category = ?e.category(), error = %e, "job failed"),
        }
        result
    }
}

/// Write the provider file, owner read/write only on unix.
async fn write_provider(path: &Path, contents: &str) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::Infra(InfraStep::Apply).to_string(), "infra apply");
        assert_eq!(Stage::Ready.to_string(), "ready");
    }

    #[tokio::test]
    async fn test_provider_file_is_replaced_not_appended() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("provider.tf");
        write_provider(&path, "first contents\n").await.unwrap();
        write_provider(&path, "second\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_provider_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("provider.tf");
        write_provider(&path, "x").await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
