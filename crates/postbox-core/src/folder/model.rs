//! Folder data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::UserId;

/// Unique identifier for a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FolderId(pub i64);

impl FolderId {
    /// Create a new folder ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

/// The five folders every user gets at signup.
///
/// They can never be renamed or deleted, and later code assumes they
/// exist without checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemFolder {
    /// Incoming mail lands here.
    Inbox,
    /// The sender's copy of outgoing mail lands here.
    Sent,
    /// Unsent drafts.
    Drafts,
    /// Soft-deleted mail destination (display only; deletion itself is
    /// a flag on the entry).
    Trash,
    /// Junk mail.
    Spam,
}

impl SystemFolder {
    /// All system folders, in creation order.
    pub const ALL: [Self; 5] = [
        Self::Inbox,
        Self::Sent,
        Self::Drafts,
        Self::Trash,
        Self::Spam,
    ];

    /// The folder's display name, unique per user among system folders.
    #[must_use]
    pub const fn folder_name(&self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
            Self::Trash => "Trash",
            Self::Spam => "Spam",
        }
    }

    /// The folder's default color tag.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Inbox => "#3498db",
            Self::Sent => "#27ae60",
            Self::Drafts => "#f39c12",
            Self::Trash => "#e74c3c",
            Self::Spam => "#95a5a6",
        }
    }
}

/// A mail folder owned by one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Folder {
    /// Unique identifier.
    pub id: FolderId,
    /// Owning user.
    pub user_id: UserId,
    /// Display name. Custom folders may share a name.
    pub name: String,
    /// Parent folder for nesting, if any.
    pub parent_id: Option<FolderId>,
    /// Color tag for presentation.
    pub color: String,
    /// System folders cannot be renamed or deleted.
    pub is_system: bool,
    /// When the folder was created.
    pub created_at: DateTime<Utc>,
}

/// A folder annotated with live counts for listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderSummary {
    /// The folder itself.
    pub folder: Folder,
    /// Active (non-deleted) entries bound to the folder.
    pub email_count: u32,
    /// Active entries not yet read.
    pub unread_count: u32,
}
