//! Folder storage repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{Folder, FolderId, FolderSummary, SystemFolder};
use crate::store::parse_timestamp;
use crate::user::UserId;
use crate::{Error, Result};

/// Default color tag for user-created folders.
const DEFAULT_COLOR: &str = "#3498db";

/// Repository for the per-user folder hierarchy.
pub struct FolderRepository {
    pool: SqlitePool,
}

impl FolderRepository {
    /// Create a repository over an existing store pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a custom folder.
    ///
    /// Duplicate names are permitted; callers that want uniqueness must
    /// enforce it themselves.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank name, or a database
    /// error.
    pub async fn create_folder(
        &self,
        user_id: UserId,
        name: &str,
        parent_id: Option<FolderId>,
        color: Option<&str>,
    ) -> Result<FolderId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("folder name must not be blank".to_string()));
        }

        let result = sqlx::query(
            r"
            INSERT INTO folders (user_id, name, parent_id, color, is_system, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            ",
        )
        .bind(user_id.0)
        .bind(name)
        .bind(parent_id.map(|p| p.0))
        .bind(color.unwrap_or(DEFAULT_COLOR))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        if id == 0 {
            return Err(Error::StoreInconsistency(
                "folder insert returned no generated id",
            ));
        }
        debug!("created folder {name} ({id}) for user {}", user_id.0);
        Ok(FolderId::new(id))
    }

    /// List a user's folders, system folders first then alphabetical,
    /// each annotated with live active-entry and unread counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_folders(&self, user_id: UserId) -> Result<Vec<FolderSummary>> {
        let rows = sqlx::query(
            r"
            SELECT f.id, f.user_id, f.name, f.parent_id, f.color, f.is_system, f.created_at,
                   COUNT(eu.message_id) AS email_count,
                   COALESCE(SUM(CASE WHEN eu.is_read = 0 THEN 1 ELSE 0 END), 0) AS unread_count
            FROM folders f
            LEFT JOIN mailbox_entries eu ON f.id = eu.folder_id AND eu.is_deleted = 0
            WHERE f.user_id = ?
            GROUP BY f.id
            ORDER BY f.is_system DESC, f.name ASC
            ",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_summary).collect())
    }

    /// Fetch a folder, only if it is owned by the given user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, folder_id: FolderId, user_id: UserId) -> Result<Option<Folder>> {
        let row = sqlx::query(
            r"
            SELECT id, user_id, name, parent_id, color, is_system, created_at
            FROM folders
            WHERE id = ? AND user_id = ?
            ",
        )
        .bind(folder_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_folder(&r)))
    }

    /// Delete a custom folder.
    ///
    /// Mail is never deleted with the folder: referencing entries have
    /// their folder reference cleared in the same transaction, and
    /// child folders are re-rooted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the folder is absent or not owned
    /// by the caller, [`Error::SystemFolder`] for a system folder, or a
    /// database error.
    pub async fn delete_folder(&self, folder_id: FolderId, user_id: UserId) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let is_system: Option<i64> =
            sqlx::query_scalar("SELECT is_system FROM folders WHERE id = ? AND user_id = ?")
                .bind(folder_id.0)
                .bind(user_id.0)
                .fetch_optional(&mut *tx)
                .await?;

        match is_system {
            None => return Err(Error::NotFound),
            Some(flag) if flag != 0 => return Err(Error::SystemFolder),
            Some(_) => {}
        }

        sqlx::query("UPDATE mailbox_entries SET folder_id = NULL WHERE folder_id = ?")
            .bind(folder_id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE folders SET parent_id = NULL WHERE parent_id = ?")
            .bind(folder_id.0)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(folder_id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        debug!("deleted folder {} for user {}", folder_id.0, user_id.0);
        Ok(())
    }

    /// Rename a custom folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a blank name,
    /// [`Error::NotFound`] if the folder is absent or not owned by the
    /// caller, [`Error::SystemFolder`] for a system folder, or a
    /// database error.
    pub async fn rename_folder(
        &self,
        folder_id: FolderId,
        user_id: UserId,
        new_name: &str,
    ) -> Result<()> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(Error::Validation("folder name must not be blank".to_string()));
        }

        let result = sqlx::query(
            r"
            UPDATE folders SET name = ?
            WHERE id = ? AND user_id = ? AND is_system = 0
            ",
        )
        .bind(new_name)
        .bind(folder_id.0)
        .bind(user_id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "system folder" from "absent or foreign".
            let is_system: Option<i64> =
                sqlx::query_scalar("SELECT is_system FROM folders WHERE id = ? AND user_id = ?")
                    .bind(folder_id.0)
                    .bind(user_id.0)
                    .fetch_optional(&self.pool)
                    .await?;
            return match is_system {
                Some(flag) if flag != 0 => Err(Error::SystemFolder),
                _ => Err(Error::NotFound),
            };
        }
        Ok(())
    }
}

/// Look up one of a user's system folders by name.
///
/// Executor-generic so the fan-out transaction can call it mid-flight.
/// Returns `None` if folder bootstrap has not run for this user.
pub(crate) async fn system_folder_id<'e, E>(
    executor: E,
    user_id: UserId,
    folder: SystemFolder,
) -> Result<Option<FolderId>>
where
    E: sqlx::SqliteExecutor<'e>,
{
    let id: Option<i64> = sqlx::query_scalar(
        r"
        SELECT id FROM folders
        WHERE user_id = ? AND name = ? AND is_system = 1
        ",
    )
    .bind(user_id.0)
    .bind(folder.folder_name())
    .fetch_optional(executor)
    .await?;

    Ok(id.map(FolderId::new))
}

/// Convert a database row to a `Folder`.
fn row_to_folder(row: &SqliteRow) -> Folder {
    Folder {
        id: FolderId::new(row.get("id")),
        user_id: UserId::new(row.get("user_id")),
        name: row.get("name"),
        parent_id: row.get::<Option<i64>, _>("parent_id").map(FolderId::new),
        color: row.get("color"),
        is_system: row.get::<i64, _>("is_system") != 0,
        created_at: parse_timestamp(row.get("created_at")),
    }
}

/// Convert an annotated listing row to a `FolderSummary`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn row_to_summary(row: &SqliteRow) -> FolderSummary {
    FolderSummary {
        folder: row_to_folder(row),
        email_count: row.get::<i64, _>("email_count") as u32,
        unread_count: row.get::<i64, _>("unread_count") as u32,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MailStore;
    use crate::user::UserRepository;

    async fn setup() -> (MailStore, FolderRepository, UserId) {
        let store = MailStore::in_memory().await.unwrap();
        let users = UserRepository::new(store.pool());
        let user = users.create("alice", "hash-a").await.unwrap();
        let folders = FolderRepository::new(store.pool());
        (store, folders, user.id)
    }

    #[tokio::test]
    async fn test_listing_order_system_first_then_alphabetical() {
        let (_store, folders, user) = setup().await;

        folders.create_folder(user, "Work", None, None).await.unwrap();
        folders.create_folder(user, "Archive", None, None).await.unwrap();

        let listed = folders.list_folders(user).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|s| s.folder.name.as_str()).collect();
        assert_eq!(
            names,
            ["Drafts", "Inbox", "Sent", "Spam", "Trash", "Archive", "Work"]
        );
        assert!(listed[..5].iter().all(|s| s.folder.is_system));
        assert!(listed[5..].iter().all(|s| !s.folder.is_system));
    }

    #[tokio::test]
    async fn test_duplicate_folder_names_permitted() {
        let (_store, folders, user) = setup().await;

        let a = folders.create_folder(user, "Receipts", None, None).await.unwrap();
        let b = folders.create_folder(user, "Receipts", None, None).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_nested_folder_keeps_parent() {
        let (_store, folders, user) = setup().await;

        let parent = folders.create_folder(user, "Work", None, None).await.unwrap();
        let child = folders
            .create_folder(user, "Invoices", Some(parent), Some("#112233"))
            .await
            .unwrap();

        let fetched = folders.get(child, user).await.unwrap().unwrap();
        assert_eq!(fetched.parent_id, Some(parent));
        assert_eq!(fetched.color, "#112233");
        assert!(!fetched.is_system);
    }

    #[tokio::test]
    async fn test_system_folder_cannot_be_deleted_or_renamed() {
        let (_store, folders, user) = setup().await;

        let listed = folders.list_folders(user).await.unwrap();
        let inbox = listed
            .iter()
            .find(|s| s.folder.name == "Inbox")
            .unwrap()
            .folder
            .id;

        let err = folders.delete_folder(inbox, user).await.unwrap_err();
        assert!(matches!(err, Error::SystemFolder));

        let err = folders.rename_folder(inbox, user, "Mailbox").await.unwrap_err();
        assert!(matches!(err, Error::SystemFolder));
    }

    #[tokio::test]
    async fn test_delete_re_roots_children() {
        let (_store, folders, user) = setup().await;

        let parent = folders.create_folder(user, "Work", None, None).await.unwrap();
        let child = folders
            .create_folder(user, "Invoices", Some(parent), None)
            .await
            .unwrap();

        folders.delete_folder(parent, user).await.unwrap();

        let fetched = folders.get(child, user).await.unwrap().unwrap();
        assert_eq!(fetched.parent_id, None);
    }

    #[tokio::test]
    async fn test_foreign_folder_reads_as_not_found() {
        let (store, folders, user) = setup().await;
        let users = UserRepository::new(store.pool());
        let other = users.create("mallory", "hash-m").await.unwrap();

        let theirs = folders
            .create_folder(other.id, "Private", None, None)
            .await
            .unwrap();

        assert!(folders.get(theirs, user).await.unwrap().is_none());
        let err = folders.delete_folder(theirs, user).await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
        let err = folders.rename_folder(theirs, user, "Mine").await.unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[tokio::test]
    async fn test_rename_custom_folder() {
        let (_store, folders, user) = setup().await;

        let id = folders.create_folder(user, "Wrok", None, None).await.unwrap();
        folders.rename_folder(id, user, "Work").await.unwrap();

        let fetched = folders.get(id, user).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Work");
    }
}
