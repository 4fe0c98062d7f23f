//! Admission errors

use crate::queue_store::QueueStoreError;
use thiserror::Error;

/// Errors returned by the admission engine
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The user is already in the wait set for this queue
    #[error("User {user_id} is already registered in queue '{queue}'")]
    AlreadyRegistered { queue: String, user_id: i64 },

    /// The presented token does not belong to this user and queue
    #[error("Token does not match user {user_id} in queue '{queue}'")]
    TokenMismatch { queue: String, user_id: i64 },

    #[error(transparent)]
    Store(#[from] QueueStoreError),
}

impl AdmissionError {
    /// Whether the backing store was unreachable or did not answer in time
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AdmissionError::Store(e) if e.is_unavailable())
    }
}

pub type AdmissionResult<T> = Result<T, AdmissionError>;
