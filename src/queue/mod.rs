//! Work queue, worker pool and the health monitor that watches them.
//!
//! The core only sees the [`WorkQueue`] and [`WorkerProbe`] traits. Delivery
//! is at-least-once: a job id may reach the executor more than once, and the
//! state machine's pending guard is what keeps the stages from running twice.

mod local;
mod monitor;
mod worker;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use local::{LocalQueue, QueueReceiver};
pub use monitor::{HealthSnapshot, QueueMonitor, RecentJob};
pub use worker::{WorkerPool, WorkerRegistry};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is closed")]
    Closed,

    #[error("queue backend unreachable: {0}")]
    Unreachable(String),
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError>;

    /// Work items accepted but not yet handed to a worker.
    async fn depth(&self) -> Result<usize, QueueError>;
}

/// A worker as seen by the liveness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub jobs_handled: u64,
}

#[async_trait]
pub trait WorkerProbe: Send + Sync {
    /// Workers that answered the probe.
    async fn live_workers(&self) -> Result<Vec<WorkerInfo>, QueueError>;
}
