//! Mailbox entry storage: fan-out, state transitions, listings, stats.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{MailboxEntry, MailboxStats, MessageView, Role};
use crate::folder::{FolderId, SystemFolder, system_folder_id};
use crate::message::{MessageId, Priority, insert_message};
use crate::store::parse_timestamp;
use crate::user::UserId;
use crate::{Error, Result};

/// Shared SELECT head for listing queries: the caller's entry joined
/// with the message and both parties' display names.
const VIEW_SELECT: &str = r"
    SELECT m.id, m.subject, m.body, m.priority, m.created_at,
           sender.name AS sender_name,
           receiver.name AS receiver_name,
           eu.is_read, eu.is_starred, eu.folder_id
    FROM messages m
    JOIN mailbox_entries eu ON m.id = eu.message_id
    LEFT JOIN mailbox_entries seu ON m.id = seu.message_id AND seu.role = 'sender'
    LEFT JOIN users sender ON seu.user_id = sender.id
    LEFT JOIN mailbox_entries reu ON m.id = reu.message_id AND reu.role = 'receiver'
    LEFT JOIN users receiver ON reu.user_id = receiver.id
";

/// Repository for mailbox entries: the fan-out write path and every
/// per-entry read and mutation.
pub struct MailboxRepository {
    pool: SqlitePool,
}

impl MailboxRepository {
    /// Create a repository over an existing store pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fan a message out to its sender and receiver entries.
    ///
    /// Runs as one transaction: insert the message, look up each
    /// party's default folder (a missing folder leaves the entry
    /// unfiled rather than failing the send), insert both entries,
    /// commit. Any failure rolls the whole delivery back, so a message
    /// without its two entries is never observable.
    ///
    /// Callers are expected to have resolved and validated the parties
    /// already; see [`crate::MailboxService::send`].
    ///
    /// # Errors
    ///
    /// Failures after the message insert are wrapped as
    /// [`Error::SendFailed`] carrying the cause.
    pub async fn deliver(
        &self,
        author: UserId,
        recipient: UserId,
        subject: &str,
        body: &str,
        priority: Priority,
    ) -> Result<MessageId> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let message_id = insert_message(&mut *tx, subject, body, priority, now).await?;

        // The message row now exists inside the transaction; dropping
        // `tx` on any early return rolls it back together with any
        // entries inserted so far.
        let sent = system_folder_id(&mut *tx, author, SystemFolder::Sent)
            .await
            .map_err(send_failed)?;
        insert_entry(&mut *tx, message_id, author, Role::Sender, sent)
            .await
            .map_err(send_failed)?;

        let inbox = system_folder_id(&mut *tx, recipient, SystemFolder::Inbox)
            .await
            .map_err(send_failed)?;
        insert_entry(&mut *tx, message_id, recipient, Role::Receiver, inbox)
            .await
            .map_err(send_failed)?;

        tx.commit()
            .await
            .map_err(|e| send_failed(Error::from(e)))?;

        debug!(
            "delivered message {} from user {} to user {}",
            message_id.0, author.0, recipient.0
        );
        Ok(message_id)
    }

    /// Fetch one user's entry for a message, regardless of role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn entry(
        &self,
        message_id: MessageId,
        user_id: UserId,
    ) -> Result<Option<MailboxEntry>> {
        let row = sqlx::query(
            r"
            SELECT message_id, user_id, role, folder_id, is_read, is_starred, is_deleted, read_at
            FROM mailbox_entries
            WHERE message_id = ? AND user_id = ?
            ",
        )
        .bind(message_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_entry(&r)))
    }

    /// Mark a received message as read.
    ///
    /// Receiver entries only; a sender's Sent copy has no unread
    /// semantics. Idempotent: returns `true` if the flag actually
    /// changed, `false` if the entry was already read.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the caller has no receiver entry
    /// for this message, or a database error.
    pub async fn mark_read(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE mailbox_entries
            SET is_read = 1, read_at = ?
            WHERE message_id = ? AND user_id = ? AND role = 'receiver' AND is_read = 0
            ",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(message_id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Nothing changed: either already read (fine) or no such entry.
        let exists: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM mailbox_entries
            WHERE message_id = ? AND user_id = ? AND role = 'receiver'
            ",
        )
        .bind(message_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;

        if exists == 0 {
            return Err(Error::NotFound);
        }
        Ok(false)
    }

    /// Flip the star on the caller's entry, either role.
    ///
    /// Returns the new starred value; applying it twice restores the
    /// original state. Flip and read-back are one statement, so under
    /// concurrent toggles each caller sees the value of their own flip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the caller has no entry for this
    /// message, or a database error.
    pub async fn toggle_star(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        let starred: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE mailbox_entries
            SET is_starred = 1 - is_starred
            WHERE message_id = ? AND user_id = ?
            RETURNING is_starred
            ",
        )
        .bind(message_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        starred.map(|value| value != 0).ok_or(Error::NotFound)
    }

    /// Soft-delete the caller's entry.
    ///
    /// The row stays in the store but disappears from every listing,
    /// search, and statistic. One-way: there is no undelete. Returns
    /// `true` if the flag actually changed, `false` if the entry was
    /// already deleted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the caller has no entry for this
    /// message, or a database error.
    pub async fn soft_delete(&self, message_id: MessageId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE mailbox_entries
            SET is_deleted = 1
            WHERE message_id = ? AND user_id = ? AND is_deleted = 0
            ",
        )
        .bind(message_id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM mailbox_entries WHERE message_id = ? AND user_id = ?",
        )
        .bind(message_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;

        if exists == 0 {
            return Err(Error::NotFound);
        }
        Ok(false)
    }

    /// Re-file the caller's entry under another of their folders.
    ///
    /// The target folder must belong to the caller; a foreign or absent
    /// folder reads as [`Error::NotFound`] so folder IDs cannot be
    /// probed across accounts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the folder or the entry is absent
    /// or not owned by the caller, or a database error.
    pub async fn move_to_folder(
        &self,
        message_id: MessageId,
        user_id: UserId,
        folder_id: FolderId,
    ) -> Result<()> {
        let owned: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM folders WHERE id = ? AND user_id = ?")
                .bind(folder_id.0)
                .bind(user_id.0)
                .fetch_one(&self.pool)
                .await?;
        if owned == 0 {
            return Err(Error::NotFound);
        }

        let result = sqlx::query(
            r"
            UPDATE mailbox_entries
            SET folder_id = ?
            WHERE message_id = ? AND user_id = ?
            ",
        )
        .bind(folder_id.0)
        .bind(message_id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// List a user's received mail, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_inbox(&self, user_id: UserId) -> Result<Vec<MessageView>> {
        self.list_role(user_id, Role::Receiver).await
    }

    /// List a user's sent mail, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_sent(&self, user_id: UserId) -> Result<Vec<MessageView>> {
        self.list_role(user_id, Role::Sender).await
    }

    async fn list_role(&self, user_id: UserId, role: Role) -> Result<Vec<MessageView>> {
        let sql = format!(
            "{VIEW_SELECT}
            WHERE eu.user_id = ? AND eu.role = ? AND eu.is_deleted = 0
            ORDER BY m.created_at DESC, m.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.0)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_view).collect())
    }

    /// List the active entries a user has filed under one folder.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_by_folder(
        &self,
        user_id: UserId,
        folder_id: FolderId,
    ) -> Result<Vec<MessageView>> {
        let sql = format!(
            "{VIEW_SELECT}
            WHERE eu.user_id = ? AND eu.folder_id = ? AND eu.is_deleted = 0
            ORDER BY m.created_at DESC, m.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id.0)
            .bind(folder_id.0)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_view).collect())
    }

    /// Substring search over subject and body of the caller's active
    /// entries, optionally restricted to one role.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search(
        &self,
        user_id: UserId,
        term: &str,
        role: Option<Role>,
    ) -> Result<Vec<MessageView>> {
        let mut sql = format!(
            r"{VIEW_SELECT}
            WHERE eu.user_id = ? AND eu.is_deleted = 0
              AND (m.subject LIKE ? ESCAPE '\' OR m.body LIKE ? ESCAPE '\')"
        );
        if role.is_some() {
            sql.push_str(" AND eu.role = ?");
        }
        sql.push_str(" ORDER BY m.created_at DESC, m.id DESC");

        let pattern = format!("%{}%", escape_like(term));
        let mut query = sqlx::query(&sql)
            .bind(user_id.0)
            .bind(&pattern)
            .bind(&pattern);
        if let Some(role) = role {
            query = query.bind(role.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_view).collect())
    }

    /// Compute aggregate mailbox counts for a user.
    ///
    /// One aggregate statement, so all six numbers come from the same
    /// snapshot even under concurrent writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn compute_stats(&self, user_id: UserId) -> Result<MailboxStats> {
        let row = sqlx::query(
            r"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN eu.role = 'receiver' AND eu.is_read = 0 THEN 1 ELSE 0 END), 0) AS unread,
                COALESCE(SUM(CASE WHEN eu.is_starred = 1 THEN 1 ELSE 0 END), 0) AS starred,
                COALESCE(SUM(CASE WHEN eu.role = 'sender' THEN 1 ELSE 0 END), 0) AS sent,
                COALESCE(SUM(CASE WHEN eu.role = 'receiver' THEN 1 ELSE 0 END), 0) AS received,
                COALESCE(SUM(m.size_bytes), 0) AS total_bytes
            FROM mailbox_entries eu
            JOIN messages m ON m.id = eu.message_id
            WHERE eu.user_id = ? AND eu.is_deleted = 0
            ",
        )
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(MailboxStats {
            total: row.get::<i64, _>("total") as u32,
            unread: row.get::<i64, _>("unread") as u32,
            starred: row.get::<i64, _>("starred") as u32,
            sent: row.get::<i64, _>("sent") as u32,
            received: row.get::<i64, _>("received") as u32,
            total_bytes: row.get::<i64, _>("total_bytes") as u64,
        })
    }
}

/// Wrap a post-insert delivery failure; the cause survives the chain.
fn send_failed(cause: Error) -> Error {
    Error::SendFailed(Box::new(cause))
}

/// Insert one mailbox entry inside the fan-out transaction.
async fn insert_entry<'e, E>(
    executor: E,
    message_id: MessageId,
    user_id: UserId,
    role: Role,
    folder_id: Option<FolderId>,
) -> Result<()>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO mailbox_entries (message_id, user_id, role, folder_id)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(message_id.0)
    .bind(user_id.0)
    .bind(role.as_str())
    .bind(folder_id.map(|f| f.0))
    .execute(executor)
    .await?;
    Ok(())
}

/// Escape LIKE wildcards so search terms stay literal substrings.
fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Convert a database row to a `MailboxEntry`.
fn row_to_entry(row: &SqliteRow) -> MailboxEntry {
    MailboxEntry {
        message_id: MessageId::new(row.get("message_id")),
        user_id: UserId::new(row.get("user_id")),
        role: Role::parse(row.get("role")),
        folder_id: row.get::<Option<i64>, _>("folder_id").map(FolderId::new),
        read: row.get::<i64, _>("is_read") != 0,
        starred: row.get::<i64, _>("is_starred") != 0,
        deleted: row.get::<i64, _>("is_deleted") != 0,
        read_at: row
            .get::<Option<String>, _>("read_at")
            .as_deref()
            .map(parse_timestamp),
    }
}

/// Convert a joined listing row to a `MessageView`.
fn row_to_view(row: &SqliteRow) -> MessageView {
    MessageView {
        message_id: MessageId::new(row.get("id")),
        subject: row.get("subject"),
        body: row.get("body"),
        priority: Priority::parse(row.get("priority")),
        created_at: parse_timestamp(row.get("created_at")),
        sender_name: row.get("sender_name"),
        receiver_name: row.get("receiver_name"),
        read: row.get::<i64, _>("is_read") != 0,
        starred: row.get::<i64, _>("is_starred") != 0,
        folder_id: row.get::<Option<i64>, _>("folder_id").map(FolderId::new),
    }
}
