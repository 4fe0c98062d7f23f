//! Ordered queue store
//!
//! Keyed collections of scored members (sorted sets) with the handful of
//! atomic primitives the admission engine is built on. The store is the only
//! place queue state lives and the only synchronization point between
//! concurrent registrations and promotions.
//!
//! Two backends ship with the crate:
//! - [`MemoryQueueStore`]: ordered sets behind a single async lock
//! - [`SqliteQueueStore`]: pooled SQLite, one transaction per atomic step

pub mod deadline;
pub mod errors;
pub mod keys;
pub mod memory_store;
pub mod migrations;
pub mod sql_store;

pub use deadline::{current_deadline, with_deadline, CallDeadline};
pub use errors::{QueueStoreError, QueueStoreResult};
pub use keys::{proceed_key, queue_name_from_wait_key, wait_key, KeyPattern, WAIT_KEY_PATTERN};
pub use memory_store::MemoryQueueStore;
pub use sql_store::SqliteQueueStore;

use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock score: unix seconds, or 0 if the clock reads before the epoch
pub fn unix_timestamp() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

/// A member together with its ordering score (unix seconds)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: i64,
}

impl ScoredMember {
    pub fn new(member: impl Into<String>, score: i64) -> Self {
        Self { member: member.into(), score }
    }
}

/// Position in a key scan. Keys are visited in ascending order and the cursor
/// remembers the last key handed out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanCursor(Option<String>);

impl ScanCursor {
    /// Cursor for a fresh scan
    pub fn start() -> Self {
        Self(None)
    }

    /// Cursor resuming after `key`
    pub fn after(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    /// Last key already returned, if any
    pub fn position(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// One page of a key scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Matching keys in this page
    pub keys: Vec<String>,
    /// Where to continue, or `None` when the scan is complete
    pub next: Option<ScanCursor>,
}

/// Storage contract for ordered queues.
///
/// Implementations must ensure, per key:
/// - `add_if_absent` never inserts the same member twice and never loses an insert
/// - `pop_min` and `transfer_min` are linearizable: two concurrent calls never
///   return overlapping members
/// - ordering is ascending score, ties broken by insertion order
/// - a call running under [`with_deadline`] either completes before the
///   deadline or fails with `Timeout` and leaves no trace
#[async_trait]
pub trait OrderedQueueStore: Send + Sync {
    /// Insert `member` with `score` only if it is not already present.
    ///
    /// Returns whether the insert happened.
    async fn add_if_absent(&self, key: &str, member: &str, score: i64) -> QueueStoreResult<bool>;

    /// Insert `member` at the back of `key` if it is not already present.
    ///
    /// The store picks the score in the same atomic step as the insert: the
    /// current unix time, raised to the highest score already under `key`.
    /// An appended member therefore ranks after every member inserted before
    /// it, however late the call reached the store.
    async fn append_if_absent(&self, key: &str, member: &str) -> QueueStoreResult<bool>;

    /// Zero-based ascending rank of `member`, or `None` if absent
    async fn rank(&self, key: &str, member: &str) -> QueueStoreResult<Option<u64>>;

    /// Atomically remove and return up to `count` lowest-ordered members
    async fn pop_min(&self, key: &str, count: usize) -> QueueStoreResult<Vec<ScoredMember>>;

    /// Bulk upsert. Existing members get their score replaced.
    ///
    /// Returns how many members were newly inserted.
    async fn add_many(&self, key: &str, entries: Vec<ScoredMember>) -> QueueStoreResult<usize>;

    /// Move up to `count` lowest-ordered members of `from` into `to` with `score`.
    ///
    /// The default composes `pop_min` and `add_many`, which leaves a window
    /// where moved members are in neither set. Backends that can do better
    /// override it with a single atomic step.
    async fn transfer_min(
        &self,
        from: &str,
        to: &str,
        count: usize,
        score: i64,
    ) -> QueueStoreResult<Vec<ScoredMember>> {
        let popped = self.pop_min(from, count).await?;
        if popped.is_empty() {
            return Ok(popped);
        }

        let moved: Vec<ScoredMember> =
            popped.iter().map(|entry| ScoredMember::new(entry.member.clone(), score)).collect();
        self.add_many(to, moved).await?;

        Ok(popped)
    }

    /// Return one page of keys matching `pattern`, starting after `cursor`.
    ///
    /// Scans are not linearizable: keys created or emptied while a scan is in
    /// progress may be missed or show up late.
    async fn scan_keys(
        &self,
        pattern: &KeyPattern,
        cursor: ScanCursor,
        count: usize,
    ) -> QueueStoreResult<ScanPage>;

    /// Cheap liveness check
    async fn ping(&self) -> QueueStoreResult<()> {
        Ok(())
    }
}
