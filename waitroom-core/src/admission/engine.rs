//! Admission engine
//!
//! Stateless between calls: every operation is a round trip to the queue
//! store, which is the only synchronization point. Store calls are bounded
//! by a per-call timeout and are never retried here. The timeout travels
//! into the store as a deadline, so a call that reports `Timeout` has not
//! changed anything.

use super::errors::{AdmissionError, AdmissionResult};
use super::WaitRank;
use crate::metrics::{record_counter, ADMISSIONS_TOTAL, REGISTRATIONS_REJECTED, REGISTRATIONS_TOTAL};
use crate::queue_store::{
    proceed_key, queue_name_from_wait_key, unix_timestamp, wait_key, with_deadline, KeyPattern,
    OrderedQueueStore, QueueStoreError, QueueStoreResult, ScanCursor,
};
use crate::token::{QueueToken, TokenIssuer};
use futures::stream::{self, Stream, TryStreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long past its deadline a store call may run before it is abandoned.
/// Stores that honor the deadline answer well inside it.
const ABANDON_GRACE: Duration = Duration::from_secs(1);

/// Registers, promotes and answers questions about queued users
pub struct AdmissionEngine<S: OrderedQueueStore + ?Sized> {
    store: Arc<S>,
    tokens: TokenIssuer,
    store_timeout: Duration,
}

impl<S: OrderedQueueStore + ?Sized> Clone for AdmissionEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            tokens: self.tokens.clone(),
            store_timeout: self.store_timeout,
        }
    }
}

impl<S: OrderedQueueStore + ?Sized> AdmissionEngine<S> {
    /// Create an engine with the default token issuer and store timeout
    pub fn new(store: Arc<S>) -> Self {
        Self { store, tokens: TokenIssuer::default(), store_timeout: DEFAULT_STORE_TIMEOUT }
    }

    pub fn with_token_issuer(mut self, tokens: TokenIssuer) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn token_issuer(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Await a store call under the store timeout.
    ///
    /// The store sees the deadline and gives up on its own, rolling back.
    /// A store that ignores it is dropped `ABANDON_GRACE` later.
    async fn bounded<T, F>(&self, call: F) -> QueueStoreResult<T>
    where
        F: Future<Output = QueueStoreResult<T>>,
    {
        let deadline = Instant::now() + self.store_timeout;

        match tokio::time::timeout_at(deadline + ABANDON_GRACE, with_deadline(deadline, call)).await {
            Ok(result) => result,
            Err(_) => Err(QueueStoreError::Timeout(self.store_timeout)),
        }
    }

    /// Put `user_id` at the back of `queue`'s wait set.
    ///
    /// Returns the rank right after insertion. If the user was promoted
    /// between the insert and the rank read, the registration still stands
    /// and the result is `WaitRank::NotWaiting`.
    ///
    /// # Errors
    /// `AlreadyRegistered` if the user is already waiting in this queue.
    pub async fn register(&self, queue: &str, user_id: i64) -> AdmissionResult<WaitRank> {
        let key = wait_key(queue);
        let member = user_id.to_string();

        let inserted = self.bounded(self.store.append_if_absent(&key, &member)).await?;
        if !inserted {
            record_counter(REGISTRATIONS_REJECTED, 1);
            debug!(queue, user_id, "Rejected duplicate registration");
            return Err(AdmissionError::AlreadyRegistered { queue: queue.to_string(), user_id });
        }
        record_counter(REGISTRATIONS_TOTAL, 1);

        let rank = WaitRank::from_zero_based(self.bounded(self.store.rank(&key, &member)).await?);
        info!(queue, user_id, rank = rank.as_i64(), "Registered user");

        Ok(rank)
    }

    /// Promote up to `count` of the longest-waiting users of `queue`.
    ///
    /// Returns how many were actually moved.
    pub async fn admit(&self, queue: &str, count: usize) -> AdmissionResult<usize> {
        if count == 0 {
            return Ok(0);
        }

        let moved = self
            .bounded(self.store.transfer_min(
                &wait_key(queue),
                &proceed_key(queue),
                count,
                unix_timestamp(),
            ))
            .await?
            .len();

        record_counter(ADMISSIONS_TOTAL, moved as u64);
        debug!(queue, requested = count, admitted = moved, "Admitted users");

        Ok(moved)
    }

    /// Whether `user_id` has been promoted in `queue`
    pub async fn is_admitted(&self, queue: &str, user_id: i64) -> AdmissionResult<bool> {
        let rank =
            self.bounded(self.store.rank(&proceed_key(queue), &user_id.to_string())).await?;
        Ok(rank.is_some())
    }

    /// Like [`is_admitted`](Self::is_admitted), but the caller must also
    /// present the user's token.
    ///
    /// # Errors
    /// `TokenMismatch` when `token` does not verify, whatever the membership.
    /// The store is not consulted in that case.
    pub async fn is_admitted_with_token(
        &self,
        queue: &str,
        user_id: i64,
        token: &str,
    ) -> AdmissionResult<bool> {
        if !self.verify_token(queue, user_id, token) {
            debug!(queue, user_id, "Token mismatch");
            return Err(AdmissionError::TokenMismatch { queue: queue.to_string(), user_id });
        }

        self.is_admitted(queue, user_id).await
    }

    /// Current one-based position of `user_id` in `queue`'s wait set
    pub async fn wait_rank(&self, queue: &str, user_id: i64) -> AdmissionResult<WaitRank> {
        let rank = self.bounded(self.store.rank(&wait_key(queue), &user_id.to_string())).await?;
        Ok(WaitRank::from_zero_based(rank))
    }

    pub fn issue_token(&self, queue: &str, user_id: i64) -> QueueToken {
        self.tokens.generate(queue, user_id)
    }

    pub fn verify_token(&self, queue: &str, user_id: i64, token: &str) -> bool {
        self.tokens.verify(queue, user_id, token)
    }

    /// Lazily enumerate the names of queues that currently have waiters.
    ///
    /// Pages are fetched on demand, `page_size` keys at a time, each fetch
    /// bounded by the store timeout. The listing is a weakly consistent
    /// snapshot: queues created or drained mid-scan may be missed.
    pub fn queue_names(
        &self,
        page_size: usize,
    ) -> impl Stream<Item = AdmissionResult<String>> + Send + '_ {
        let pattern = KeyPattern::wait_keys();

        stream::try_unfold(Some(ScanCursor::start()), move |cursor| {
            let pattern = pattern.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok(None);
                };

                let page =
                    self.bounded(self.store.scan_keys(&pattern, cursor, page_size)).await?;
                let names: Vec<AdmissionResult<String>> = page
                    .keys
                    .iter()
                    .filter_map(|key| queue_name_from_wait_key(key))
                    .map(|name| Ok(name.to_string()))
                    .collect();

                Ok::<_, AdmissionError>(Some((stream::iter(names), page.next)))
            }
        })
        .try_flatten()
    }
}
