use std::fmt;

use tracing::{debug, warn};

use super::job::{Job, JobStatus, Payload};
use crate::store::{JobStore, StoreError, UpdateOutcome};

/// Why a requested transition was not applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The edge does not exist in the transition table.
    IllegalEdge,
    /// The payload does not belong to the target status.
    PayloadMismatch,
    /// Another writer changed the record after it was read.
    Conflict { current: JobStatus },
    /// The record disappeared between read and write.
    Vanished,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::IllegalEdge => write!(f, "illegal transition"),
            RejectReason::PayloadMismatch => write!(f, "payload does not match target status"),
            RejectReason::Conflict { current } => write!(f, "conflict, job is now {current}"),
            RejectReason::Vanished => write!(f, "job no longer exists"),
        }
    }
}

/// The result of asking the state machine for a status change.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The change was persisted; carries the updated record.
    Applied(Job),
    /// Nothing was written.
    Rejected {
        from: JobStatus,
        to: JobStatus,
        reason: RejectReason,
    },
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }
}

/// Single authority over job status changes.
///
/// pending → processing | failed, processing → completed | failed.
/// Completed and failed are terminal.
pub struct StateMachine;

impl StateMachine {
    pub fn allowed_targets(from: JobStatus) -> &'static [JobStatus] {
        match from {
            JobStatus::Pending => &[JobStatus::Processing, JobStatus::Failed],
            JobStatus::Processing => &[JobStatus::Completed, JobStatus::Failed],
            JobStatus::Completed | JobStatus::Failed => &[],
        }
    }

    pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
        Self::allowed_targets(from).contains(&to)
    }

    /// Validate a transition without touching storage.
    pub fn check(job: &Job, to: JobStatus, payload: Option<&Payload>) -> Result<(), RejectReason> {
        if !Self::can_transition(job.status, to) {
            return Err(RejectReason::IllegalEdge);
        }
        let payload_fits = matches!(
            (to, payload),
            (JobStatus::Processing, None)
                | (JobStatus::Completed, Some(Payload::Completed(_)))
                | (JobStatus::Failed, Some(Payload::Failed { .. }))
        );
        if payload_fits {
            Ok(())
        } else {
            Err(RejectReason::PayloadMismatch)
        }
    }

    /// Move `job` to `to`, writing `payload` in the same conditional update.
    ///
    /// The store write is conditioned on `job.status`, so when two workers race
    /// on one job only the first succeeds. Rejections are returned as values;
    /// only storage faults are errors.
    pub async fn transition(
        store: &dyn JobStore,
        job: &Job,
        to: JobStatus,
        payload: Option<Payload>,
    ) -> Result<Transition, StoreError> {
        let from = job.status;
        if let Err(reason) = Self::check(job, to, payload.as_ref()) {
            warn!(job_id = %job.id, %from, %to, %reason, "transition rejected");
            return Ok(Transition::Rejected { from, to, reason });
        }

        let outcome = store.conditional_update(job.id, from, to, payload).await?;
        let transition = match outcome {
            UpdateOutcome::Updated(updated) => {
                debug!(job_id = %job.id, %from, %to, "transition applied");
                Transition::Applied(updated)
            }
            UpdateOutcome::Conflict(current) => {
                let reason = RejectReason::Conflict { current };
                warn!(job_id = %job.id, %from, %to, %reason, "transition rejected");
                Transition::Rejected { from, to, reason }
            }
            UpdateOutcome::NotFound => {
                warn!(job_id = %job.id, %from, %to, "transition target vanished");
                Transition::Rejected {
                    from,
                    to,
                    reason: RejectReason::Vanished,
                }
            }
        };
        Ok(transition)
    }
}
