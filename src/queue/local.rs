use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;
use uuid::Uuid;

use super::{QueueError, WorkQueue};

/// In-process work queue over an unbounded channel.
///
/// Cloning the sender side is cheap; the receiving side is shared by all
/// workers of a pool through [`QueueReceiver`].
#[derive(Clone)]
pub struct LocalQueue {
    tx: mpsc::UnboundedSender<Uuid>,
    depth: Arc<AtomicUsize>,
}

/// Consumer half of a [`LocalQueue`], shared by the workers.
pub struct QueueReceiver {
    rx: Mutex<mpsc::UnboundedReceiver<Uuid>>,
    depth: Arc<AtomicUsize>,
}

impl LocalQueue {
    pub fn new() -> (Self, QueueReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                depth: Arc::clone(&depth),
            },
            QueueReceiver {
                rx: Mutex::new(rx),
                depth,
            },
        )
    }
}

impl QueueReceiver {
    /// Wait for the next job id. `None` once every sender is gone and the
    /// queue has drained.
    pub async fn next(&self) -> Option<Uuid> {
        let id = self.rx.lock().await.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(id)
    }
}

#[async_trait]
impl WorkQueue for LocalQueue {
    async fn enqueue(&self, job_id: Uuid) -> Result<(), QueueError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(job_id).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }
        debug!(%job_id, "job enqueued");
        Ok(())
    }

    async fn depth(&self) -> Result<usize, QueueError> {
        if self.tx.is_closed() {
            return Err(QueueError::Closed);
        }
        Ok(self.depth.load(Ordering::SeqCst))
    }
}
