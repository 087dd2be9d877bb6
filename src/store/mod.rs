//! Job record persistence.
//!
//! [`JobStore`] is the seam between the core and whatever durable store holds
//! job records. Two implementations ship with the crate: [`MemoryJobStore`]
//! for tests and inline runs, and [`FileJobStore`] which keeps one JSON file
//! per job under a data directory.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::state_machine::{Job, JobStatus, Payload};

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt job record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of a compare-and-swap on a job's status.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Job),
    /// The stored status differed from the expected one; carries what was found.
    Conflict(JobStatus),
    NotFound,
}

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCounts {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobCounts {
    pub fn record(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

impl<'a> FromIterator<&'a Job> for JobCounts {
    fn from_iter<I: IntoIterator<Item = &'a Job>>(iter: I) -> Self {
        let mut counts = JobCounts::default();
        for job in iter {
            counts.record(job.status);
        }
        counts
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a fresh pending job with a generated id.
    async fn create(&self) -> Result<Job, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Apply `new_status` and `payload` only if the stored status still equals
    /// `expected`. The read-compare-write must be atomic with respect to other
    /// callers of this method.
    async fn conditional_update(
        &self,
        id: Uuid,
        expected: JobStatus,
        new_status: JobStatus,
        payload: Option<Payload>,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn count_by_status(&self) -> Result<JobCounts, StoreError>;

    /// Most recently created jobs first.
    async fn recent(&self, limit: usize) -> Result<Vec<Job>, StoreError>;
}

/// Newest first, ties broken by id so listings are stable.
pub(crate) fn sort_recent(jobs: &mut [Job]) {
    jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
}
