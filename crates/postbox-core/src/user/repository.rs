//! User storage repository.

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqlitePool;
use tracing::debug;

use super::model::{User, UserId};
use crate::folder::SystemFolder;
use crate::store::parse_timestamp;
use crate::{Error, Result};

/// Minimum length of a user name, in characters.
const MIN_NAME_LEN: usize = 3;

/// Repository for user accounts and recipient resolution.
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Create a repository over an existing store pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new user.
    ///
    /// The user row and their five system folders are inserted in a
    /// single transaction, so by the time this returns the Inbox and
    /// Sent folders the fan-out path depends on are guaranteed to
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for a name shorter than three
    /// characters or an empty credential hash, [`Error::NameTaken`] if
    /// the name is already registered, or a database error.
    pub async fn create(&self, name: &str, password_hash: &str) -> Result<User> {
        let name = name.trim();
        if name.chars().count() < MIN_NAME_LEN {
            return Err(Error::Validation(format!(
                "user name must be at least {MIN_NAME_LEN} characters"
            )));
        }
        if password_hash.is_empty() {
            return Err(Error::Validation(
                "credential hash must not be empty".to_string(),
            ));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            INSERT INTO users (name, password_hash, created_at)
            VALUES (?, ?, ?)
            ",
        )
        .bind(name)
        .bind(password_hash)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Error::NameTaken(name.to_string())
            }
            other => Error::from(other),
        })?;

        let user_id = result.last_insert_rowid();
        if user_id == 0 {
            return Err(Error::StoreInconsistency(
                "user insert returned no generated id",
            ));
        }

        for folder in SystemFolder::ALL {
            sqlx::query(
                r"
                INSERT INTO folders (user_id, name, color, is_system, created_at)
                VALUES (?, ?, ?, 1, ?)
                ",
            )
            .bind(user_id)
            .bind(folder.folder_name())
            .bind(folder.color())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("registered user {name} with id {user_id}");

        Ok(User {
            id: UserId::new(user_id),
            name: name.to_string(),
            password_hash: password_hash.to_string(),
            created_at: now,
            last_login: None,
            is_active: true,
        })
    }

    /// Resolve a recipient name to a user ID.
    ///
    /// Pure read; the send path consults this before opening any
    /// transaction so a doomed send never touches the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn resolve(&self, name: &str) -> Result<Option<UserId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE name = ?")
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(id.map(UserId::new))
    }

    /// Fetch a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, name, password_hash, created_at, last_login, is_active
            FROM users
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Check credentials against an active account.
    ///
    /// Returns `None` on unknown name, wrong credential, or a
    /// deactivated account; the three cases are not distinguished.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn verify_credentials(&self, name: &str, password_hash: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, name, password_hash, created_at, last_login, is_active
            FROM users
            WHERE name = ? AND password_hash = ? AND is_active = 1
            ",
        )
        .bind(name.trim())
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Record a successful login.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user does not exist, or a
    /// database error.
    pub async fn touch_last_login(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    /// Soft-deactivate an account. The row and its mail stay in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the user does not exist, or a
    /// database error.
    pub async fn deactivate(&self, id: UserId) -> Result<()> {
        let result = sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound);
        }
        debug!("deactivated user {}", id.0);
        Ok(())
    }
}

/// Convert a database row to a `User`.
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    User {
        id: UserId::new(row.get("id")),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        created_at: parse_timestamp(row.get("created_at")),
        last_login: row
            .get::<Option<String>, _>("last_login")
            .as_deref()
            .map(parse_timestamp),
        is_active: row.get::<i64, _>("is_active") != 0,
    }
}
