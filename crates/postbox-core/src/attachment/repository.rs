//! Attachment metadata repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};

use super::model::{Attachment, AttachmentId};
use crate::message::MessageId;
use crate::store::parse_timestamp;
use crate::{Error, Result};

/// Repository for attachment metadata.
pub struct AttachmentRepository {
    pool: SqlitePool,
}

impl AttachmentRepository {
    /// Create a repository over an existing store pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record attachment metadata against a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank file name, or a
    /// database error (including a missing message).
    pub async fn record(
        &self,
        message_id: MessageId,
        file_name: &str,
        file_size: u64,
        mime_type: &str,
        file_path: &str,
    ) -> Result<AttachmentId> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::Validation("file name must not be blank".to_string()));
        }
        let file_size = i64::try_from(file_size)
            .map_err(|_| Error::Validation("file size out of range".to_string()))?;

        let result = sqlx::query(
            r"
            INSERT INTO attachments (message_id, file_name, file_size, mime_type, file_path, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(message_id.0)
        .bind(file_name)
        .bind(file_size)
        .bind(mime_type)
        .bind(file_path)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        if id == 0 {
            return Err(Error::StoreInconsistency(
                "attachment insert returned no generated id",
            ));
        }
        Ok(AttachmentId::new(id))
    }

    /// List the attachments recorded for a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_message(&self, message_id: MessageId) -> Result<Vec<Attachment>> {
        let rows = sqlx::query(
            r"
            SELECT id, message_id, file_name, file_size, mime_type, file_path, uploaded_at
            FROM attachments
            WHERE message_id = ?
            ORDER BY id
            ",
        )
        .bind(message_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_attachment).collect())
    }

    /// Total recorded attachment bytes for a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn total_size(&self, message_id: MessageId) -> Result<u64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(file_size), 0) FROM attachments WHERE message_id = ?",
        )
        .bind(message_id.0)
        .fetch_one(&self.pool)
        .await?;

        #[allow(clippy::cast_sign_loss)]
        Ok(total as u64)
    }

    /// Remove one attachment record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no such record exists, or a
    /// database error.
    pub async fn remove(&self, id: AttachmentId) -> Result<()> {
        let result = sqlx::query("DELETE FROM attachments WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }
}

/// Convert a database row to an `Attachment`.
#[allow(clippy::cast_sign_loss)]
fn row_to_attachment(row: &SqliteRow) -> Attachment {
    Attachment {
        id: AttachmentId::new(row.get("id")),
        message_id: MessageId::new(row.get("message_id")),
        file_name: row.get("file_name"),
        file_size: row.get::<i64, _>("file_size") as u64,
        mime_type: row.get("mime_type"),
        file_path: row.get("file_path"),
        uploaded_at: parse_timestamp(row.get("uploaded_at")),
    }
}
