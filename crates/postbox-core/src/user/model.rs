//! User data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl UserId {
    /// Create a new user ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

/// A registered mailbox owner.
///
/// The credential secret is stored as an opaque hash; this crate never
/// inspects it beyond equality checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Unique display name, used as the recipient address.
    pub name: String,
    /// Opaque credential hash.
    pub password_hash: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the user last logged in, if ever.
    pub last_login: Option<DateTime<Utc>>,
    /// Inactive users cannot log in. Accounts are soft-deactivated,
    /// never hard-deleted.
    pub is_active: bool,
}
