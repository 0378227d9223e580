//! # postbox-core
//!
//! Message fan-out and mailbox state engine for the Postbox personal-mail
//! backend.
//!
//! This crate provides:
//! - User accounts and recipient resolution
//! - Per-user folder hierarchy with the five system folders
//! - Immutable message storage
//! - **Mailbox fan-out** - one authored message becomes independent
//!   per-party mailbox entries, created atomically
//! - Per-entry read/star/delete/folder state transitions
//! - Listing, substring search, and aggregate mailbox statistics
//! - Attachment metadata bookkeeping
//!
//! Presentation layers (GUI, console, HTTP) sit on top of
//! [`MailboxService`]; the crate itself speaks only to the relational
//! store and never to the network.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachment;
mod error;
pub mod folder;
pub mod mailbox;
pub mod message;
pub mod service;
pub mod store;
pub mod user;

pub use attachment::{Attachment, AttachmentId, AttachmentRepository};
pub use error::{Error, Result};
pub use folder::{Folder, FolderId, FolderRepository, FolderSummary, SystemFolder};
pub use mailbox::{MailboxEntry, MailboxRepository, MailboxStats, MessageView, Role};
pub use message::{Message, MessageId, MessageRepository, Priority};
pub use service::MailboxService;
pub use store::MailStore;
pub use user::{User, UserId, UserRepository};
