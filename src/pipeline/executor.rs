use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::pool::ClientPool;
use super::stage::{Stage, StageResult, produce_checklist, produce_diagram, produce_summary};
use crate::error::IngestError;
use crate::state_machine::{Artifacts, Job, JobStatus, Payload, StateMachine, Transition};
use crate::store::JobStore;

/// What happened when a job id was handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    /// No record for the id; nothing was touched.
    NotFound,
    /// The job was not pending (redelivery or a concurrent worker); no stage ran.
    Skipped { status: JobStatus },
    Completed,
    /// A stage failed and the job was marked failed with `cause`.
    Failed { stage: Stage, cause: String },
    /// An unexpected fault interrupted the run. `recorded` tells whether the
    /// fault could be written to the job as a failure.
    Aborted { cause: String, recorded: bool },
}

/// Runs the summary → checklist → diagram chain for one job at a time.
pub struct PipelineExecutor {
    store: Arc<dyn JobStore>,
    pool: ClientPool,
    stage_timeout: Duration,
}

impl PipelineExecutor {
    pub fn new(store: Arc<dyn JobStore>, pool: ClientPool, stage_timeout: Duration) -> Self {
        Self {
            store,
            pool,
            stage_timeout,
        }
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// Process one job. Never returns an error: every fault ends up either as
    /// the job's failed status or, when the job is gone, in the log.
    #[instrument(skip_all, fields(job_id = %job_id))]
    pub async fn execute(&self, job_id: Uuid) -> ExecutionReport {
        match self.run(job_id).await {
            Ok(report) => report,
            Err(fault) => self.abort(job_id, fault).await,
        }
    }

    async fn run(&self, job_id: Uuid) -> Result<ExecutionReport, IngestError> {
        let store = self.store.as_ref();
        let Some(job) = store.get(job_id).await? else {
            warn!("job not found");
            return Ok(ExecutionReport::NotFound);
        };
        if !job.is_pending() {
            info!(status = %job.status, "job already picked up, skipping");
            return Ok(ExecutionReport::Skipped { status: job.status });
        }

        let lease = self.pool.acquire().await?;

        let started = StateMachine::transition(store, &job, JobStatus::Processing, None).await?;
        let job = match started {
            Transition::Applied(job) => job,
            Transition::Rejected { reason, .. } => {
                info!(%reason, "lost the race to start job, skipping");
                let status = store
                    .get(job_id)
                    .await?
                    .map(|j| j.status)
                    .unwrap_or(job.status);
                return Ok(ExecutionReport::Skipped { status });
            }
        };
        info!("job processing");

        let summary = match produce_summary(&*lease, self.stage_timeout).await {
            StageResult::Success(text) => text,
            StageResult::Failure { cause } => return self.fail(&job, Stage::Summary, cause).await,
        };

        let checklist = match produce_checklist(&*lease, &summary, self.stage_timeout).await {
            StageResult::Success(text) => text,
            StageResult::Failure { cause } => return self.fail(&job, Stage::Checklist, cause).await,
        };

        let diagram = match produce_diagram(&*lease, &summary, &checklist, self.stage_timeout).await
        {
            StageResult::Success(text) => text,
            StageResult::Failure { cause } => return self.fail(&job, Stage::Diagram, cause).await,
        };
        drop(lease);

        let payload = Payload::Completed(Artifacts {
            summary,
            checklist,
            diagram,
        });
        let finished =
            StateMachine::transition(store, &job, JobStatus::Completed, Some(payload)).await?;
        match finished {
            Transition::Applied(_) => {
                info!("job completed");
                Ok(ExecutionReport::Completed)
            }
            Transition::Rejected { reason, .. } => Err(IngestError::Rejected(reason)),
        }
    }

    async fn fail(
        &self,
        job: &Job,
        stage: Stage,
        cause: String,
    ) -> Result<ExecutionReport, IngestError> {
        let payload = Payload::Failed {
            error: cause.clone(),
        };
        match StateMachine::transition(self.store.as_ref(), job, JobStatus::Failed, Some(payload))
            .await?
        {
            Transition::Applied(_) => {
                warn!(%stage, %cause, "job failed");
                Ok(ExecutionReport::Failed { stage, cause })
            }
            Transition::Rejected { reason, .. } => Err(IngestError::Rejected(reason)),
        }
    }

    async fn abort(&self, job_id: Uuid, fault: IngestError) -> ExecutionReport {
        let cause = fault.to_string();
        error!(error = %cause, "unexpected fault while processing job");
        let recorded = self.record_failure(job_id, &cause).await;
        ExecutionReport::Aborted { cause, recorded }
    }

    /// Best-effort: mark a non-terminal job failed with `cause`. Returns whether
    /// the failure was written. A vanished job or a second fault is only logged.
    pub async fn record_failure(&self, job_id: Uuid, cause: &str) -> bool {
        match self.store.get(job_id).await {
            Ok(Some(job)) if !job.status.is_terminal() => {
                let payload = Payload::Failed {
                    error: cause.to_string(),
                };
                let store = self.store.as_ref();
                let attempt =
                    StateMachine::transition(store, &job, JobStatus::Failed, Some(payload)).await;
                match attempt {
                    Ok(t) => t.is_applied(),
                    Err(e) => {
                        error!(error = %e, "could not record failure");
                        false
                    }
                }
            }
            Ok(Some(_)) => false,
            Ok(None) => {
                warn!("job vanished, fault not recorded");
                false
            }
            Err(e) => {
                error!(error = %e, "could not reload job to record failure");
                false
            }
        }
    }
}
