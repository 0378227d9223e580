//! Attachment data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageId;

/// Unique identifier for an attachment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentId(pub i64);

impl AttachmentId {
    /// Create a new attachment ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

/// Metadata for one file associated with a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Unique identifier.
    pub id: AttachmentId,
    /// The message this file belongs to.
    pub message_id: MessageId,
    /// Original file name.
    pub file_name: String,
    /// File size in bytes.
    pub file_size: u64,
    /// MIME type as reported by the attachment subsystem.
    pub mime_type: String,
    /// Opaque reference into the external attachment store.
    pub file_path: String,
    /// When the metadata was recorded.
    pub uploaded_at: DateTime<Utc>,
}
