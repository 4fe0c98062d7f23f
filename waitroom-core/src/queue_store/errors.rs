/*
    errors.rs - Error types for the queue store subsystem

    Defines the failures a queue store backend can report:
    - transport / pool failures (store unreachable)
    - operation deadlines
    - backend-level storage errors
    - schema migration failures
*/

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while talking to an ordered queue store
#[derive(Debug, Error)]
pub enum QueueStoreError {
    /// The store could not be reached (pool exhausted, connection refused, task died)
    #[error("Queue store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the caller-supplied deadline
    #[error("Queue store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The store answered with an error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Schema migration failed
    #[error("Migration error: {0}")]
    Migration(String),
}

impl QueueStoreError {
    /// Whether this failure means the store itself is unreachable or too slow,
    /// as opposed to rejecting a particular operation.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueStoreError::Unavailable(_) | QueueStoreError::Timeout(_))
    }
}

impl From<rusqlite::Error> for QueueStoreError {
    fn from(err: rusqlite::Error) -> Self {
        QueueStoreError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for QueueStoreError {
    fn from(err: r2d2::Error) -> Self {
        QueueStoreError::Unavailable(format!("Failed to get connection: {}", err))
    }
}

impl From<tokio::task::JoinError> for QueueStoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        QueueStoreError::Unavailable(format!("Task join error: {}", err))
    }
}

/// Result type for queue store operations
pub type QueueStoreResult<T> = Result<T, QueueStoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_store_error_display() {
        let err = QueueStoreError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "Storage error: disk full");

        let err = QueueStoreError::Timeout(Duration::from_millis(250));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_unavailable_classification() {
        assert!(QueueStoreError::Unavailable("refused".into()).is_unavailable());
        assert!(QueueStoreError::Timeout(Duration::from_secs(1)).is_unavailable());
        assert!(!QueueStoreError::Storage("constraint".into()).is_unavailable());
        assert!(!QueueStoreError::Migration("v2".into()).is_unavailable());
    }
}
