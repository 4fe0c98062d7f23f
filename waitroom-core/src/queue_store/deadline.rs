//! Per-call store deadlines
//!
//! The caller sets a deadline around a store future with [`with_deadline`];
//! backends read it with [`current_deadline`] and must either finish their
//! work before it or give up without side effects. A backend that commits
//! must check the deadline before committing, never after.

use super::errors::{QueueStoreError, QueueStoreResult};
use std::future::Future;
use tokio::task_local;
use tokio::time::Instant;

task_local! {
    static DEADLINE: Instant;
}

/// Run `call` with `deadline` visible to the store it calls into
pub async fn with_deadline<F: Future>(deadline: Instant, call: F) -> F::Output {
    DEADLINE.scope(deadline, call).await
}

/// Deadline of the store call being polled, if the caller set one
pub fn current_deadline() -> Option<Instant> {
    DEADLINE.try_with(|deadline| *deadline).ok()
}

/// A deadline captured when a store call starts.
///
/// Plain data so it can cross into blocking threads, which do not see
/// task-locals.
#[derive(Debug, Clone, Copy)]
pub struct CallDeadline {
    started: Instant,
    at: Option<Instant>,
}

impl CallDeadline {
    /// Capture the current task's deadline, if any
    pub fn capture() -> Self {
        Self { started: Instant::now(), at: current_deadline() }
    }

    pub fn at(&self) -> Option<Instant> {
        self.at
    }

    /// Time left, or `None` when there is no deadline
    pub fn remaining(&self) -> Option<std::time::Duration> {
        self.at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail with `Timeout` once the deadline has passed
    pub fn check(&self) -> QueueStoreResult<()> {
        if self.is_expired() {
            Err(self.timeout())
        } else {
            Ok(())
        }
    }

    /// The error reported for this call when it runs out of time
    pub fn timeout(&self) -> QueueStoreError {
        QueueStoreError::Timeout(self.started.elapsed())
    }
}
