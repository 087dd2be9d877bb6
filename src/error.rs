use thiserror::Error;
use uuid::Uuid;

use crate::pipeline::PoolClosed;
use crate::queue::QueueError;
use crate::state_machine::RejectReason;
use crate::store::StoreError;

/// Crate-level error aggregating every boundary's failure type.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("transition rejected: {0}")]
    Rejected(RejectReason),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    PoolClosed(#[from] PoolClosed),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_display_transparently() {
        let err: IngestError = StoreError::Io(std::io::Error::other("disk full")).into();
        assert_eq!(err.to_string(), "store I/O error: disk full");
    }

    #[test]
    fn rejection_display() {
        let err = IngestError::Rejected(RejectReason::Vanished);
        assert_eq!(err.to_string(), "transition rejected: job no longer exists");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<IngestError>();
    }
}
