//! Shared relational store handle.
//!
//! One [`MailStore`] owns the `SQLite` connection pool and the schema;
//! repositories receive pool clones from it instead of reaching for any
//! global connection state.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::Result;

/// Parse an RFC 3339 timestamp column, falling back to now on garbage.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}

/// Handle to the mailbox database.
///
/// Cloning the underlying pool is cheap; every repository holds its own
/// clone and all of them share the same bounded set of connections.
pub struct MailStore {
    pool: SqlitePool,
}

impl MailStore {
    /// Open (or create) the database at the given path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let options = SqliteConnectOptions::from_str(&url)?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema
    /// creation fails.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// A clone of the connection pool for a repository to hold.
    #[must_use]
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                last_login TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                name TEXT NOT NULL,
                parent_id INTEGER REFERENCES folders(id),
                color TEXT NOT NULL DEFAULT '#3498db',
                is_system INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'normal',
                size_bytes INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Per-party view of a message. The composite key is what makes
        // sender and receiver state independent.
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS mailbox_entries (
                message_id INTEGER NOT NULL REFERENCES messages(id),
                user_id INTEGER NOT NULL REFERENCES users(id),
                role TEXT NOT NULL,
                folder_id INTEGER REFERENCES folders(id),
                is_read INTEGER NOT NULL DEFAULT 0,
                is_starred INTEGER NOT NULL DEFAULT 0,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                read_at TEXT,
                PRIMARY KEY (message_id, user_id, role)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id INTEGER NOT NULL REFERENCES messages(id),
                file_name TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                mime_type TEXT NOT NULL,
                file_path TEXT NOT NULL,
                uploaded_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        // Indexes for the hot lookups
        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_folders_user ON folders(user_id, name)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_entries_user_role
            ON mailbox_entries(user_id, role)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_entries_folder ON mailbox_entries(folder_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments(message_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_schema_bootstrap() {
        let store = MailStore::in_memory().await.unwrap();

        // All five tables exist and are queryable.
        for table in [
            "users",
            "folders",
            "messages",
            "mailbox_entries",
            "attachments",
        ] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&store.pool())
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let store = MailStore::in_memory().await.unwrap();
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_pool_exhaustion_surfaces_as_resource_exhausted() {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .unwrap()
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(50))
            .connect_with(options)
            .await
            .unwrap();

        // Hold the only connection so the next acquire must give up
        // instead of hanging the caller.
        let held = pool.acquire().await.unwrap();
        let users = crate::user::UserRepository::new(pool.clone());

        let err = users.resolve("alice").await.unwrap_err();
        assert!(matches!(err, crate::Error::ResourceExhausted));
        assert!(err.is_retryable());
        drop(held);
    }
}
