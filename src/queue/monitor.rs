use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{WorkQueue, WorkerProbe};
use crate::state_machine::JobStatus;
use crate::store::{JobCounts, JobStore};

/// A job as listed on the health page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// Point-in-time view of queue, workers and jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub queue_length: usize,
    pub queue_reachable: bool,
    pub worker_reachable: bool,
    pub worker_count: usize,
    pub jobs: JobCounts,
    pub recent_jobs: Vec<RecentJob>,
    pub taken_at: DateTime<Utc>,
}

/// Read-only aggregator behind the health endpoint.
///
/// Every read is bounded by `probe_timeout` and degrades to a zero value on
/// fault or timeout, so [`snapshot`](QueueMonitor::snapshot) always returns.
#[derive(Clone)]
pub struct QueueMonitor {
    queue: Arc<dyn WorkQueue>,
    probe: Arc<dyn WorkerProbe>,
    store: Arc<dyn JobStore>,
    probe_timeout: Duration,
    recent_limit: usize,
}

impl QueueMonitor {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        probe: Arc<dyn WorkerProbe>,
        store: Arc<dyn JobStore>,
        probe_timeout: Duration,
        recent_limit: usize,
    ) -> Self {
        Self {
            queue,
            probe,
            store,
            probe_timeout,
            recent_limit,
        }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        let (depth, workers, counts, recent) = tokio::join!(
            self.bounded("queue", self.queue.depth()),
            self.bounded("workers", self.probe.live_workers()),
            self.bounded("job counts", self.store.count_by_status()),
            self.bounded("recent jobs", self.store.recent(self.recent_limit)),
        );

        let queue_reachable = depth.is_some();
        let worker_count = workers.map(|w| w.len()).unwrap_or(0);
        HealthSnapshot {
            queue_length: depth.unwrap_or(0),
            queue_reachable,
            worker_reachable: worker_count > 0,
            worker_count,
            jobs: counts.unwrap_or_default(),
            recent_jobs: recent
                .unwrap_or_default()
                .into_iter()
                .map(|job| RecentJob {
                    id: job.id,
                    status: job.status,
                    created_at: job.created_at,
                })
                .collect(),
            taken_at: Utc::now(),
        }
    }

    async fn bounded<T, E, F>(&self, what: &'static str, read: F) -> Option<T>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.probe_timeout, read).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                warn!(source = what, error = %e, "health read failed");
                None
            }
            Err(_) => {
                let timeout_ms = self.probe_timeout.as_millis() as u64;
                warn!(source = what, timeout_ms, "health read timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::queue::{LocalQueue, QueueError, WorkerInfo, WorkerRegistry};
    use crate::store::MemoryJobStore;

    struct DownQueue;

    #[async_trait]
    impl WorkQueue for DownQueue {
        async fn enqueue(&self, _job_id: Uuid) -> Result<(), QueueError> {
            Err(QueueError::Unreachable("connection refused".into()))
        }

        async fn depth(&self) -> Result<usize, QueueError> {
            Err(QueueError::Unreachable("connection refused".into()))
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl WorkerProbe for HangingProbe {
        async fn live_workers(&self) -> Result<Vec<WorkerInfo>, QueueError> {
            std::future::pending().await
        }
    }

    struct StaticProbe(usize);

    #[async_trait]
    impl WorkerProbe for StaticProbe {
        async fn live_workers(&self) -> Result<Vec<WorkerInfo>, QueueError> {
            let now = Utc::now();
            Ok((0..self.0)
                .map(|i| WorkerInfo {
                    name: format!("w{i}"),
                    started_at: now,
                    last_seen: now,
                    jobs_handled: 0,
                })
                .collect())
        }
    }

    async fn seeded_store() -> Arc<MemoryJobStore> {
        let store = Arc::new(MemoryJobStore::new());
        let a = store.create().await.unwrap();
        store.create().await.unwrap();
        let c = store.create().await.unwrap();
        store
            .conditional_update(a.id, JobStatus::Pending, JobStatus::Processing, None)
            .await
            .unwrap();
        store
            .conditional_update(
                c.id,
                JobStatus::Pending,
                JobStatus::Failed,
                Some(crate::state_machine::Payload::Failed {
                    error: "boom".into(),
                }),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn degraded_backends_still_yield_a_snapshot() {
        let store = seeded_store().await;
        let monitor = QueueMonitor::new(
            Arc::new(DownQueue),
            Arc::new(HangingProbe),
            store,
            Duration::from_millis(20),
            20,
        );

        let snapshot = monitor.snapshot().await;
        assert!(!snapshot.queue_reachable);
        assert!(!snapshot.worker_reachable);
        assert_eq!(snapshot.worker_count, 0);
        assert_eq!(snapshot.queue_length, 0);
        assert_eq!(
            snapshot.jobs,
            JobCounts {
                total: 3,
                pending: 1,
                processing: 1,
                completed: 0,
                failed: 1,
            }
        );
        assert_eq!(snapshot.recent_jobs.len(), 3);
    }

    #[tokio::test]
    async fn healthy_backends_are_reported() {
        let store = seeded_store().await;
        let (queue, _receiver) = LocalQueue::new();
        queue.enqueue(Uuid::new_v4()).await.unwrap();
        let monitor = QueueMonitor::new(
            Arc::new(queue),
            Arc::new(StaticProbe(3)),
            store,
            Duration::from_secs(1),
            2,
        );

        let snapshot = monitor.snapshot().await;
        assert!(snapshot.queue_reachable);
        assert_eq!(snapshot.queue_length, 1);
        assert!(snapshot.worker_reachable);
        assert_eq!(snapshot.worker_count, 3);
        assert_eq!(snapshot.recent_jobs.len(), 2);
    }

    #[tokio::test]
    async fn empty_registry_means_no_reachable_worker() {
        let (queue, _receiver) = LocalQueue::new();
        let monitor = QueueMonitor::new(
            Arc::new(queue),
            Arc::new(WorkerRegistry::new(Duration::from_secs(30))),
            Arc::new(MemoryJobStore::new()),
            Duration::from_secs(1),
            20,
        );

        let snapshot = monitor.snapshot().await;
        assert!(snapshot.queue_reachable);
        assert!(!snapshot.worker_reachable);
        assert_eq!(snapshot.jobs, JobCounts::default());
        assert!(snapshot.recent_jobs.is_empty());
    }

    #[tokio::test]
    async fn snapshot_does_not_mutate_jobs() {
        let store = seeded_store().await;
        let before = store.recent(10).await.unwrap();
        let monitor = QueueMonitor::new(
            Arc::new(DownQueue),
            Arc::new(StaticProbe(1)),
            store.clone(),
            Duration::from_millis(50),
            20,
        );
        monitor.snapshot().await;
        monitor.snapshot().await;
        assert_eq!(store.recent(10).await.unwrap(), before);
    }
}
