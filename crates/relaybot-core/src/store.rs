//! SQLite-backed persistence handle.
//!
//! The `Store` owns the connection pool; entity repositories (`registry`,
//! `relay_map`) borrow it per call. Uniqueness is enforced by the schema, and a
//! unique-key violation is reported as `Insert::AlreadyExists` instead of an error.

use std::{path::Path, str::FromStr, time::Duration};

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteQueryResult,
};

use crate::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        group_id TEXT UNIQUE NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS relayed_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        original_chat_id TEXT NOT NULL,
        original_message_id INTEGER NOT NULL,
        relayed_chat_id TEXT NOT NULL,
        relayed_message_id INTEGER NOT NULL
    )
    "#,
    // A relayed copy has at most one original.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS relayed_messages_copy
        ON relayed_messages (relayed_chat_id, relayed_message_id)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS relayed_messages_original
        ON relayed_messages (original_chat_id, original_message_id)
    "#,
];

/// Result of a unique-key insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Insert {
    Added,
    AlreadyExists,
}

/// Result of a delete-by-key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

#[derive(Clone, Debug)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if needed) the database file and apply the schema.
    pub async fn open(path: &Path, max_connections: u32) -> Result<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to `:memory:` is its own database, so pin exactly one.
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for &stmt in SCHEMA {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Map an INSERT result onto `Insert`, keeping non-uniqueness failures as errors.
pub(crate) fn classify_insert(
    res: std::result::Result<SqliteQueryResult, sqlx::Error>,
) -> Result<Insert> {
    match res {
        Ok(_) => Ok(Insert::Added),
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Ok(Insert::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn classify_delete(res: &SqliteQueryResult) -> Removal {
    if res.rows_affected() > 0 {
        Removal::Removed
    } else {
        Removal::NotFound
    }
}
