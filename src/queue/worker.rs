use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::{QueueError, QueueReceiver, WorkerInfo, WorkerProbe};
use crate::pipeline::PipelineExecutor;

const CRASH_CAUSE: &str = "job run crashed";

#[derive(Debug, Clone)]
struct WorkerEntry {
    info: WorkerInfo,
    current_job: Option<Uuid>,
}

/// Registry of running workers, refreshed by their heartbeats.
///
/// A worker counts as live while it is busy with a job or when its last
/// heartbeat is younger than `stale_after`.
#[derive(Clone)]
pub struct WorkerRegistry {
    workers: Arc<RwLock<HashMap<String, WorkerEntry>>>,
    stale_after: Duration,
}

impl WorkerRegistry {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            workers: Arc::new(RwLock::new(HashMap::new())),
            stale_after,
        }
    }

    async fn register(&self, name: &str) {
        let now = Utc::now();
        self.workers.write().await.insert(
            name.to_string(),
            WorkerEntry {
                info: WorkerInfo {
                    name: name.to_string(),
                    started_at: now,
                    last_seen: now,
                    jobs_handled: 0,
                },
                current_job: None,
            },
        );
    }

    async fn deregister(&self, name: &str) {
        self.workers.write().await.remove(name);
    }

    async fn heartbeat(&self, name: &str) {
        if let Some(entry) = self.workers.write().await.get_mut(name) {
            entry.info.last_seen = Utc::now();
        }
    }

    async fn begin_job(&self, name: &str, job_id: Uuid) {
        if let Some(entry) = self.workers.write().await.get_mut(name) {
            entry.info.last_seen = Utc::now();
            entry.current_job = Some(job_id);
        }
    }

    async fn end_job(&self, name: &str) {
        if let Some(entry) = self.workers.write().await.get_mut(name) {
            entry.info.last_seen = Utc::now();
            entry.info.jobs_handled += 1;
            entry.current_job = None;
        }
    }

    fn is_live(&self, entry: &WorkerEntry) -> bool {
        if entry.current_job.is_some() {
            return true;
        }
        let age = Utc::now() - entry.info.last_seen;
        age.to_std().map(|age| age <= self.stale_after).unwrap_or(true)
    }
}

#[async_trait]
impl WorkerProbe for WorkerRegistry {
    async fn live_workers(&self) -> Result<Vec<WorkerInfo>, QueueError> {
        let workers = self.workers.read().await;
        let mut live: Vec<WorkerInfo> = workers
            .values()
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.info.clone())
            .collect();
        live.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(live)
    }
}

/// A fixed set of worker tasks draining a [`QueueReceiver`].
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        receiver: Arc<QueueReceiver>,
        executor: Arc<PipelineExecutor>,
        registry: WorkerRegistry,
        heartbeat: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handles = (0..count.max(1))
            .map(|i| {
                let worker = Worker {
                    name: format!("worker-{i}"),
                    receiver: Arc::clone(&receiver),
                    executor: Arc::clone(&executor),
                    registry: registry.clone(),
                    heartbeat,
                };
                tokio::spawn(worker.run(shutdown_rx.clone()))
            })
            .collect();
        Self { handles, shutdown }
    }

    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Ask every worker to stop after its current job and wait for them.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

struct Worker {
    name: String,
    receiver: Arc<QueueReceiver>,
    executor: Arc<PipelineExecutor>,
    registry: WorkerRegistry,
    heartbeat: Duration,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        self.registry.register(&self.name).await;
        info!(worker = %self.name, "worker started");
        let mut ticker = tokio::time::interval(self.heartbeat);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => self.registry.heartbeat(&self.name).await,
                next = self.receiver.next() => {
                    let Some(job_id) = next else { break };
                    self.handle(job_id).await;
                }
            }
        }

        self.registry.deregister(&self.name).await;
        info!(worker = %self.name, "worker stopped");
    }

    async fn handle(&self, job_id: Uuid) {
        self.registry.begin_job(&self.name, job_id).await;
        debug!(worker = %self.name, %job_id, "job dispatched");

        // A panic inside the run must not take the worker down with it.
        let executor = Arc::clone(&self.executor);
        match tokio::spawn(async move { executor.execute(job_id).await }).await {
            Ok(report) => info!(worker = %self.name, %job_id, ?report, "job handled"),
            Err(e) => {
                error!(worker = %self.name, %job_id, error = %e, "job run panicked");
                self.executor.record_failure(job_id, CRASH_CAUSE).await;
            }
        }

        self.registry.end_job(&self.name).await;
    }
}
