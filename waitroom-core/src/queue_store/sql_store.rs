//! SQLite-based Queue Store
//!
//! Persists sorted sets in a single `queue_entries` table. Blocking SQLite
//! calls run on the blocking thread pool; connections come from an `r2d2`
//! pool so many requests can be in flight at once.
//!
//! Atomicity:
//! - every write runs inside a `BEGIN IMMEDIATE` transaction, so concurrent
//!   writers are serialized
//! - `append_if_absent` reads the tail score and inserts in one statement
//!   under that write lock
//!
//! Deadlines: the caller's deadline (see [`super::deadline`]) bounds the wait
//! for a pooled connection and SQLite's busy handler, and is checked again
//! right before every commit. A write that misses it rolls back.

use super::deadline::CallDeadline;
use super::errors::{QueueStoreError, QueueStoreResult};
use super::keys::KeyPattern;
use super::migrations;
use super::{unix_timestamp, OrderedQueueStore, ScanCursor, ScanPage, ScoredMember};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// How long a connection waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Extra wait past a caller's deadline, so that giving up on a lock always
/// lands after the deadline and reads as a timeout
const DEADLINE_SLACK: Duration = Duration::from_millis(50);

/// SQL `LIMIT` for `count` rows, saturating instead of wrapping
fn sql_limit(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// SQLite-backed ordered queue store
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqliteQueueStore {
    /// Open (or create) a store at `db_path` with up to `pool_size` connections
    pub fn open<P: AsRef<Path>>(db_path: P, pool_size: u32) -> QueueStoreResult<Self> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(|e| QueueStoreError::Unavailable(format!("Failed to create connection pool: {}", e)))?;

        Self::with_pool(pool)
    }

    /// Create a private in-memory store.
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// capped at one connection.
    pub fn in_memory() -> QueueStoreResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| QueueStoreError::Unavailable(format!("Failed to create connection pool: {}", e)))?;

        Self::with_pool(pool)
    }

    /// Wrap an existing pool, running migrations first
    pub fn with_pool(pool: Pool<SqliteConnectionManager>) -> QueueStoreResult<Self> {
        migrations::migrate(&pool)?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Run `op` with a pooled connection on the blocking thread pool.
    ///
    /// Any failure after the caller's deadline has passed is reported as
    /// `Timeout`, whatever SQLite said.
    async fn with_conn<T, F>(&self, op: F) -> QueueStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CallDeadline) -> QueueStoreResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let deadline = CallDeadline::capture();

        tokio::task::spawn_blocking(move || {
            let run = || -> QueueStoreResult<T> {
                deadline.check()?;
                let mut conn = match deadline.remaining() {
                    Some(remaining) => pool.get_timeout(remaining + DEADLINE_SLACK)?,
                    None => pool.get()?,
                };
                let busy = deadline
                    .remaining()
                    .map_or(BUSY_TIMEOUT, |remaining| (remaining + DEADLINE_SLACK).min(BUSY_TIMEOUT));
                conn.busy_timeout(busy)?;
                op(&mut conn, &deadline)
            };

            match run() {
                Err(_) if deadline.is_expired() => Err(deadline.timeout()),
                result => result,
            }
        })
        .await?
    }

    /// Run `op` in an immediate transaction, committing only within the deadline
    async fn write_tx<T, F>(&self, op: F) -> QueueStoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Transaction<'_>) -> QueueStoreResult<T> + Send + 'static,
    {
        self.with_conn(move |conn, deadline| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = op(&tx)?;
            deadline.check()?;
            tx.commit()?;
            Ok(out)
        })
        .await
    }
}

fn pop_min_tx(tx: &Transaction<'_>, key: &str, count: usize) -> QueueStoreResult<Vec<ScoredMember>> {
    let rows: Vec<(i64, String, i64)> = {
        let mut stmt = tx.prepare_cached(
            "SELECT seq, member, score FROM queue_entries
             WHERE set_key = ?
             ORDER BY score ASC, seq ASC
             LIMIT ?",
        )?;
        let rows = stmt
            .query_map(params![key, sql_limit(count)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows
    };

    let mut delete = tx.prepare_cached("DELETE FROM queue_entries WHERE seq = ?")?;
    for (seq, _, _) in &rows {
        delete.execute(params![seq])?;
    }

    Ok(rows.into_iter().map(|(_, member, score)| ScoredMember { member, score }).collect())
}

fn add_many_tx(tx: &Transaction<'_>, key: &str, entries: &[ScoredMember]) -> QueueStoreResult<usize> {
    let mut insert = tx.prepare_cached(
        "INSERT OR IGNORE INTO queue_entries (set_key, member, score) VALUES (?, ?, ?)",
    )?;
    let mut rescore =
        tx.prepare_cached("UPDATE queue_entries SET score = ? WHERE set_key = ? AND member = ?")?;

    let mut inserted = 0;
    for entry in entries {
        if insert.execute(params![key, &entry.member, entry.score])? == 1 {
            inserted += 1;
        } else {
            rescore.execute(params![entry.score, key, &entry.member])?;
        }
    }

    Ok(inserted)
}

#[async_trait]
impl OrderedQueueStore for SqliteQueueStore {
    async fn add_if_absent(&self, key: &str, member: &str, score: i64) -> QueueStoreResult<bool> {
        let key = key.to_string();
        let member = member.to_string();

        self.write_tx(move |tx| {
            let changed = tx.execute(
                "INSERT OR IGNORE INTO queue_entries (set_key, member, score) VALUES (?, ?, ?)",
                params![&key, &member, score],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn append_if_absent(&self, key: &str, member: &str) -> QueueStoreResult<bool> {
        let key = key.to_string();
        let member = member.to_string();

        self.write_tx(move |tx| {
            // The aggregate always yields one row, even for an empty set
            let changed = tx.execute(
                "INSERT OR IGNORE INTO queue_entries (set_key, member, score)
                 SELECT ?1, ?2, MAX(?3, COALESCE(MAX(score), ?3))
                 FROM queue_entries WHERE set_key = ?1",
                params![&key, &member, unix_timestamp()],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    async fn rank(&self, key: &str, member: &str) -> QueueStoreResult<Option<u64>> {
        let key = key.to_string();
        let member = member.to_string();

        self.with_conn(move |conn, _| {
            let rank: Option<i64> = conn
                .query_row(
                    r#"
                    SELECT (
                        SELECT COUNT(*) FROM queue_entries o
                        WHERE o.set_key = e.set_key
                          AND (o.score < e.score OR (o.score = e.score AND o.seq < e.seq))
                    )
                    FROM queue_entries e
                    WHERE e.set_key = ? AND e.member = ?
                    "#,
                    params![&key, &member],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(rank.map(|r| r as u64))
        })
        .await
    }

    async fn pop_min(&self, key: &str, count: usize) -> QueueStoreResult<Vec<ScoredMember>> {
        let key = key.to_string();
        self.write_tx(move |tx| pop_min_tx(tx, &key, count)).await
    }

    async fn add_many(&self, key: &str, entries: Vec<ScoredMember>) -> QueueStoreResult<usize> {
        let key = key.to_string();
        self.write_tx(move |tx| add_many_tx(tx, &key, &entries)).await
    }

    async fn transfer_min(
        &self,
        from: &str,
        to: &str,
        count: usize,
        score: i64,
    ) -> QueueStoreResult<Vec<ScoredMember>> {
        let from = from.to_string();
        let to = to.to_string();

        self.write_tx(move |tx| {
            let popped = pop_min_tx(tx, &from, count)?;
            let moved: Vec<ScoredMember> =
                popped.iter().map(|entry| ScoredMember::new(entry.member.clone(), score)).collect();
            add_many_tx(tx, &to, &moved)?;
            Ok(popped)
        })
        .await
    }

    async fn scan_keys(
        &self,
        pattern: &KeyPattern,
        cursor: ScanCursor,
        count: usize,
    ) -> QueueStoreResult<ScanPage> {
        let glob = pattern.to_sql_glob();
        let count = count.max(1);

        self.with_conn(move |conn, _| {
            // Keyset pagination over matching keys; one extra row tells whether more remain
            let mut keys: Vec<String> = {
                let mut stmt = conn.prepare_cached(
                    "SELECT DISTINCT set_key FROM queue_entries
                     WHERE set_key > ? AND set_key GLOB ?
                     ORDER BY set_key ASC
                     LIMIT ?",
                )?;
                let after = cursor.position().unwrap_or("");
                let keys = stmt
                    .query_map(params![after, &glob, sql_limit(count).saturating_add(1)], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                keys
            };

            let next = if keys.len() > count {
                keys.truncate(count);
                keys.last().cloned().map(ScanCursor::after)
            } else {
                None
            };

            Ok(ScanPage { keys, next })
        })
        .await
    }

    async fn ping(&self) -> QueueStoreResult<()> {
        self.with_conn(|conn, _| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}
