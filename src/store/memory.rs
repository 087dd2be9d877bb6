use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{JobCounts, JobStore, StoreError, UpdateOutcome, sort_recent};
use crate::state_machine::{Job, JobStatus, Payload};

/// Job store backed by a map behind an async lock.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record as-is, bypassing the state machine. Test setup only.
    #[cfg(test)]
    pub(crate) async fn insert(&self, job: Job) {
        self.jobs.write().await.insert(job.id, job);
    }

    /// Drop a record, simulating an external retention process.
    #[cfg(test)]
    pub(crate) async fn remove(&self, id: Uuid) -> Option<Job> {
        self.jobs.write().await.remove(&id)
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self) -> Result<Job, StoreError> {
        let job = Job::new();
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn conditional_update(
        &self,
        id: Uuid,
        expected: JobStatus,
        new_status: JobStatus,
        payload: Option<Payload>,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if job.status != expected {
            return Ok(UpdateOutcome::Conflict(job.status));
        }
        job.apply(new_status, payload);
        Ok(UpdateOutcome::Updated(job.clone()))
    }

    async fn count_by_status(&self) -> Result<JobCounts, StoreError> {
        Ok(self.jobs.read().await.values().collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Job>, StoreError> {
        let mut jobs: Vec<Job> = self.jobs.read().await.values().cloned().collect();
        sort_recent(&mut jobs);
        jobs.truncate(limit);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn create_then_get() {
        let store = MemoryJobStore::new();
        let job = store.create().await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(store.get(job.id).await.unwrap(), Some(job));
    }

    #[tokio::test]
    async fn get_unknown_id() {
        let store = MemoryJobStore::new();
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn conditional_update_checks_expected_status() {
        let store = MemoryJobStore::new();
        let job = store.create().await.unwrap();

        let outcome = store
            .conditional_update(job.id, JobStatus::Processing, JobStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::Conflict(JobStatus::Pending));

        let outcome = store
            .conditional_update(job.id, JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap();
        assert!(matches!(outcome, UpdateOutcome::Updated(j) if j.status == JobStatus::Processing));

        let outcome = store
            .conditional_update(Uuid::new_v4(), JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn concurrent_updates_have_one_winner() {
        let store = Arc::new(MemoryJobStore::new());
        let job = store.create().await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .conditional_update(job.id, JobStatus::Pending, JobStatus::Processing, None)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), UpdateOutcome::Updated(_)) {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn recent_is_newest_first_and_limited() {
        let store = MemoryJobStore::new();
        let now = Utc::now();
        for minutes in 0..5 {
            let mut job = Job::new();
            job.created_at = now - Duration::minutes(minutes);
            store.insert(job).await;
        }

        let recent = store.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(recent[0].created_at, now);
    }

    #[tokio::test]
    async fn counts_track_statuses() {
        let store = MemoryJobStore::new();
        let a = store.create().await.unwrap();
        store.create().await.unwrap();
        store
            .conditional_update(a.id, JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap();

        let counts = store.count_by_status().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
    }
}
