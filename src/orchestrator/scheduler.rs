//! Bounded-concurrency admission of jobs.
//!
//! Jobs are admitted in discovery order through a counting gate; each admitted job runs as its own task and holds
//! one unit of the gate until its pipeline returns. Completion order is unconstrained.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::error::JobError;
use super::job::Job;
use super::pipeline::JobRunner;

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    capacity: usize,
}

impl Scheduler {
    /// A scheduler admitting at most `capacity` jobs at once (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Admit every job and wait until all admitted jobs have finished.
    ///
    /// Once `cancel` fires no further job is admitted; jobs already running are still awaited. Each job's outcome is
    /// recorded on the job itself, including a panicked pipeline task.
    pub async fn run(&self, jobs: &[Arc<Job>], runner: Arc<dyn JobRunner>, cancel: &CancellationToken) {
        let gate = Arc::new(Semaphore::new(self.capacity));
        let mut tasks = JoinSet::new();
        let mut admitted = HashMap::new();

        for job in jobs {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tracing::info!(remaining = jobs.len() - admitted.len(), "run cancelled; no further jobs admitted");
                    break;
                }
                permit = Arc::clone(&gate).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            tracing::debug!(job = %job.name, "job admitted");
            job.mark_admitted();
            let task_job = Arc::clone(job);
            let runner = Arc::clone(&runner);
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let outcome = runner.run(&task_job).await;
                task_job.record_outcome(outcome);
            });
            admitted.insert(handle.id(), Arc::clone(job));
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            let Err(e) = joined else {
                continue;
            };
            if let Some(job) = admitted.get(&e.id()) {
                tracing::warn!(job = %job.name, error = %e, "job task did not complete");
                job.record_outcome(Err(JobError::Aborted(e.to_string())));
            }
        }
    }
}
