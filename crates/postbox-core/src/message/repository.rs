//! Message storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqlitePool;

use super::model::{Message, MessageId, Priority};
use crate::store::parse_timestamp;
use crate::{Error, Result};

/// Insert a message row and return its generated ID.
///
/// Executor-generic so the fan-out transaction owns the insert; nothing
/// else in the crate creates message rows.
pub(crate) async fn insert_message<'e, E>(
    executor: E,
    subject: &str,
    body: &str,
    priority: Priority,
    now: DateTime<Utc>,
) -> Result<MessageId>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let size_bytes = i64::try_from(body.len())
        .map_err(|_| Error::Validation("message body too large".to_string()))?;

    let result = sqlx::query(
        r"
        INSERT INTO messages (subject, body, priority, size_bytes, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(subject)
    .bind(body)
    .bind(priority.as_str())
    .bind(size_bytes)
    .bind(now.to_rfc3339())
    .execute(executor)
    .await?;

    let id = result.last_insert_rowid();
    if id == 0 {
        return Err(Error::StoreInconsistency(
            "message insert returned no generated id",
        ));
    }
    Ok(MessageId::new(id))
}

/// Read access to stored messages.
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a repository over an existing store pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a message by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn fetch(&self, id: MessageId) -> Result<Option<Message>> {
        let row = sqlx::query(
            r"
            SELECT id, subject, body, priority, size_bytes, created_at
            FROM messages
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_message(&r)))
    }
}

/// Convert a database row to a `Message`.
#[allow(clippy::cast_sign_loss)]
fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    Message {
        id: MessageId::new(row.get("id")),
        subject: row.get("subject"),
        body: row.get("body"),
        priority: Priority::parse(row.get("priority")),
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        created_at: parse_timestamp(row.get("created_at")),
    }
}
