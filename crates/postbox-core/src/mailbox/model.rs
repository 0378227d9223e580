//! Mailbox entry data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::folder::FolderId;
use crate::message::{MessageId, Priority};
use crate::user::UserId;

/// Which side of a delivery an entry represents.
///
/// Exactly one closed enumeration; the store only ever sees the
/// lowercase strings from [`Role::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// The author's copy, bound to their Sent folder.
    Sender,
    /// A recipient's copy, bound to their Inbox.
    Receiver,
}

impl Role {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sender" => Self::Sender,
            _ => Self::Receiver,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

/// One party's mutable view of a shared message.
///
/// Keyed by (message, user, role); mutating one entry never touches the
/// underlying message or the other party's entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxEntry {
    /// The referenced message.
    pub message_id: MessageId,
    /// The owning party.
    pub user_id: UserId,
    /// Which side of the delivery this is.
    pub role: Role,
    /// Folder the entry is filed under; `None` if unfiled.
    pub folder_id: Option<FolderId>,
    /// Whether the entry has been read. Meaningful for receiver copies
    /// only.
    pub read: bool,
    /// Whether the entry is starred.
    pub starred: bool,
    /// Soft-delete flag; deleted entries are hidden from every query
    /// but remain recoverable in the store.
    pub deleted: bool,
    /// When the entry was first marked read, if ever.
    pub read_at: Option<DateTime<Utc>>,
}

/// A joined listing row: one mailbox entry together with the message
/// content and the display names of both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageView {
    /// The referenced message.
    pub message_id: MessageId,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Delivery priority.
    pub priority: Priority,
    /// When the message was authored.
    pub created_at: DateTime<Utc>,
    /// Display name of the sender, if the sender entry still exists.
    pub sender_name: Option<String>,
    /// Display name of the receiver, if the receiver entry still
    /// exists.
    pub receiver_name: Option<String>,
    /// Read flag of the caller's entry.
    pub read: bool,
    /// Starred flag of the caller's entry.
    pub starred: bool,
    /// Folder of the caller's entry.
    pub folder_id: Option<FolderId>,
}

/// Aggregate mailbox counts for one user, computed from a single
/// consistent snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MailboxStats {
    /// Active entries across both roles.
    pub total: u32,
    /// Active receiver entries not yet read.
    pub unread: u32,
    /// Active entries with the star set.
    pub starred: u32,
    /// Active sender entries.
    pub sent: u32,
    /// Active receiver entries.
    pub received: u32,
    /// Sum of message body sizes across the user's active entries. A
    /// message counts once per entry, so sender and receiver each carry
    /// their own copy's bytes.
    pub total_bytes: u64,
}
