use std::ops::Deref;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::stage::GenerativeClient;

#[derive(Debug, Error)]
#[error("client pool is closed")]
pub struct PoolClosed;

/// A shared generative client plus a cap on how many pipeline runs may use
/// it at once.
///
/// Each run takes a [`ClientLease`]; dropping the lease returns the slot, so
/// the slot comes back however the run ends.
#[derive(Clone)]
pub struct ClientPool {
    client: Arc<dyn GenerativeClient>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl ClientPool {
    pub fn new(client: Arc<dyn GenerativeClient>, max_concurrent_runs: usize) -> Self {
        let capacity = max_concurrent_runs.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<ClientLease, PoolClosed> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolClosed)?;
        Ok(ClientLease {
            client: Arc::clone(&self.client),
            _permit: permit,
        })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stop handing out leases. Runs already holding one finish normally.
    pub fn close(&self) {
        self.permits.close();
    }
}

/// Scoped access to the pooled client for one pipeline run.
pub struct ClientLease {
    client: Arc<dyn GenerativeClient>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for ClientLease {
    type Target = dyn GenerativeClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::pipeline::CallError;

    struct Echo;

    #[async_trait]
    impl GenerativeClient for Echo {
        async fn call(&self, _instructions: &str, input: &str) -> Result<String, CallError> {
            Ok(input.to_string())
        }
    }

    #[tokio::test]
    async fn lease_releases_on_drop() {
        let pool = ClientPool::new(Arc::new(Echo), 2);
        assert_eq!(pool.available(), 2);

        let lease = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 1);
        assert_eq!(lease.call("", "hi").await.unwrap(), "hi");

        drop(lease);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn zero_capacity_is_raised_to_one() {
        let pool = ClientPool::new(Arc::new(Echo), 0);
        assert_eq!(pool.capacity(), 1);
        let _lease = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);
    }

    #[tokio::test]
    async fn acquire_waits_for_a_free_slot() {
        let pool = ClientPool::new(Arc::new(Echo), 1);
        let held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|_| ()) })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_pool_refuses_leases() {
        let pool = ClientPool::new(Arc::new(Echo), 1);
        pool.close();
        assert!(pool.acquire().await.is_err());
    }
}
