//! Database migrations for the SQLite queue store
//!
//! Each migration is applied atomically and tracked in the
//! `queue_schema_version` table.

use super::errors::{QueueStoreError, QueueStoreResult};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Current schema version for the queue store
pub const CURRENT_QUEUE_SCHEMA_VERSION: i32 = 1;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Sorted-set entries for wait and proceed queues",
        up_sql: r#"
            -- One row per (set key, member). seq doubles as the insertion-order tie-break.
            CREATE TABLE IF NOT EXISTS queue_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                set_key TEXT NOT NULL,              -- e.g. users:queue:default:wait
                member TEXT NOT NULL,               -- stringified user id
                score INTEGER NOT NULL,             -- unix seconds
                UNIQUE (set_key, member)
            );

            CREATE INDEX IF NOT EXISTS idx_queue_entries_order
                ON queue_entries(set_key, score, seq);
        "#,
    }]
}

fn unix_millis() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as i64).unwrap_or(0)
}

/// Get current schema version from database
fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> QueueStoreResult<i32> {
    let conn = pool.get()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS queue_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM queue_schema_version", [], |row| row.get(0))
        .map_err(|e| QueueStoreError::Migration(format!("Failed to read schema version: {}", e)))?;

    Ok(version.unwrap_or(0))
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> QueueStoreResult<()> {
    let current_version = get_current_version(pool)?;

    let pending_migrations: Vec<_> =
        get_migrations().into_iter().filter(|m| m.version > current_version).collect();

    if pending_migrations.is_empty() {
        return Ok(());
    }

    let mut conn = pool.get()?;

    for migration in pending_migrations {
        let tx = conn.transaction()?;

        tx.execute_batch(migration.up_sql).map_err(|e| {
            QueueStoreError::Migration(format!("v{} failed: {}", migration.version, e))
        })?;

        tx.execute(
            "INSERT INTO queue_schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, unix_millis()],
        )?;

        tx.commit()?;

        info!(
            version = migration.version,
            description = migration.description,
            "Applied queue store migration"
        );
    }

    Ok(())
}

/// Get the latest migration version available
pub fn get_latest_version() -> i32 {
    get_migrations().iter().map(|m| m.version).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_test_pool() -> Pool<SqliteConnectionManager> {
        let manager = SqliteConnectionManager::memory();
        Pool::builder().max_size(1).build(manager).expect("Failed to create pool")
    }

    #[test]
    fn test_initial_migration() {
        let pool = setup_test_pool();
        migrate(&pool).expect("Migration failed");

        let conn = pool.get().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"queue_entries".to_string()));
        assert!(tables.contains(&"queue_schema_version".to_string()));
    }

    #[test]
    fn test_idempotent_migrations() {
        let pool = setup_test_pool();

        migrate(&pool).expect("First migration failed");
        migrate(&pool).expect("Second migration failed");

        let version = get_current_version(&pool).expect("Failed to get version");
        assert_eq!(version, CURRENT_QUEUE_SCHEMA_VERSION);
        assert_eq!(get_latest_version(), CURRENT_QUEUE_SCHEMA_VERSION);
    }

    #[test]
    fn test_member_unique_per_key() {
        let pool = setup_test_pool();
        migrate(&pool).unwrap();
        let conn = pool.get().unwrap();

        conn.execute(
            "INSERT INTO queue_entries (set_key, member, score) VALUES (?, ?, ?)",
            params!["users:queue:default:wait", "1", 10],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO queue_entries (set_key, member, score) VALUES (?, ?, ?)",
            params!["users:queue:default:wait", "1", 11],
        );
        assert!(duplicate.is_err());

        // Same member under another key is fine
        conn.execute(
            "INSERT INTO queue_entries (set_key, member, score) VALUES (?, ?, ?)",
            params!["users:queue:default:proceed", "1", 12],
        )
        .unwrap();
    }
}
