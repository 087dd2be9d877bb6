//! Operations behind the API surface: submit, status and health.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::IngestError;
use crate::pipeline::{ExecutionReport, PipelineExecutor};
use crate::queue::{HealthSnapshot, QueueMonitor, WorkQueue};
use crate::state_machine::{Job, JobResult, JobStatus, Payload, StateMachine};
use crate::store::JobStore;

/// How a submitted job gets processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Hand the id to the work queue and return immediately.
    #[default]
    Queued,
    /// Run the pipeline before returning. For the CLI and tests.
    Inline,
}

/// Status projection returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<JobResult>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id,
            status: job.status,
            created_at: job.created_at,
            updated_at: job.updated_at,
            result: job.result(),
        }
    }
}

pub struct JobService {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn WorkQueue>,
    executor: Arc<PipelineExecutor>,
    monitor: QueueMonitor,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn WorkQueue>,
        executor: Arc<PipelineExecutor>,
        monitor: QueueMonitor,
    ) -> Self {
        Self {
            store,
            queue,
            executor,
            monitor,
        }
    }

    /// Create a pending job and start its processing according to `mode`.
    ///
    /// If the queue refuses the id, the job is marked failed with the enqueue
    /// fault instead of staying pending with nobody to pick it up. The job is
    /// still returned so the caller can hand out its id.
    pub async fn submit(&self, mode: ExecutionMode) -> Result<Job, IngestError> {
        let job = self.store.create().await?;
        info!(job_id = %job.id, ?mode, "job created");

        match mode {
            ExecutionMode::Queued => {
                if let Err(e) = self.queue.enqueue(job.id).await {
                    error!(job_id = %job.id, error = %e, "failed to enqueue job");
                    let payload = Payload::Failed {
                        error: format!("failed to enqueue job: {e}"),
                    };
                    StateMachine::transition(
                        self.store.as_ref(),
                        &job,
                        JobStatus::Failed,
                        Some(payload),
                    )
                    .await?;
                }
            }
            ExecutionMode::Inline => {
                let report = self.executor.execute(job.id).await;
                info!(job_id = %job.id, ?report, "inline run finished");
            }
        }

        Ok(self.store.get(job.id).await?.unwrap_or(job))
    }

    pub async fn status(&self, id: Uuid) -> Result<JobView, IngestError> {
        let job = self
            .store
            .get(id)
            .await?
            .ok_or(IngestError::JobNotFound(id))?;
        Ok(JobView::from(&job))
    }

    /// Run the executor for an existing id, as a worker would on redelivery.
    pub async fn process(&self, id: Uuid) -> ExecutionReport {
        self.executor.execute(id).await
    }

    pub async fn health(&self) -> HealthSnapshot {
        self.monitor.snapshot().await
    }
}
