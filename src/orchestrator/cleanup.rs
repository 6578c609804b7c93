//! Per-job teardown: kill what is still running, then remove the generated artifacts.
//!
//! Nothing here fails: every problem is logged and teardown carries on, so a cleanup hiccup can never change a job's
//! outcome or the run's exit status. Running it twice on the same job is harmless.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tftest_core::artifacts::{CACHE_DIR, LOCK_FILE, STATE_FILE};

use super::job::Job;
use super::terminate::{ProcessTreeKill, Terminator};
use crate::config::CleanupConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    File,
    Dir,
}

pub struct Cleanup {
    terminator: Arc<dyn Terminator>,
    config: CleanupConfig,
}

impl Cleanup {
    pub fn new(config: CleanupConfig) -> Self {
        Self::with_terminator(config, Arc::new(ProcessTreeKill))
    }

    pub fn with_terminator(config: CleanupConfig, terminator: Arc<dyn Terminator>) -> Self {
        Self { terminator, config }
    }

    /// Terminate every process the job still has running and close its registry.
    pub fn terminate_processes(&self, job: &Job) {
        for handle in job.processes().drain() {
            if handle.has_exited() {
                continue;
            }
            tracing::debug!(job = %job.name, program = handle.program(), pid = handle.pid(), "terminating process");
            if let Err(e) = self.terminator.terminate(&handle) {
                tracing::warn!(job = %job.name, program = handle.program(), error = %e, "failed to kill process");
            }
        }
    }

    /// Remove the provider file, infra state and lock files, and the infra tool's cache directory.
    pub async fn remove_artifacts(&self, job: &Job) {
        let targets = [
            (job.provider_file.clone(), Artifact::File),
            (job.dir.join(STATE_FILE), Artifact::File),
            (job.dir.join(LOCK_FILE), Artifact::File),
            (job.dir.join(CACHE_DIR), Artifact::Dir),
        ];
        for (path, kind) in targets {
            if let Err(e) = self.remove_with_retry(&path, kind).await {
                tracing::warn!(job = %job.name, path = %path.display(), error = %e, "failed to clean up");
            }
        }
    }

    pub async fn clean(&self, job: &Job) {
        self.terminate_processes(job);
        self.remove_artifacts(job).await;
    }

    async fn remove_with_retry(&self, path: &Path, kind: Artifact) -> io::Result<()> {
        let attempts = self.config.attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match kind {
                Artifact::File => tokio::fs::remove_file(path).await,
                Artifact::Dir => tokio::fs::remove_dir_all(path).await,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(path = %path.display(), attempt, error = %e, "removal failed; retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.delay).await;
                }
            }
        }
    }
}
