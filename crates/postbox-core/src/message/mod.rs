//! Immutable message storage.
//!
//! A message row carries the authored content only; per-recipient state
//! lives in the mailbox entries that reference it. Rows are created
//! exclusively by the fan-out transaction and never change afterwards.

mod model;
mod repository;

pub use model::{Message, MessageId, Priority};
pub use repository::MessageRepository;

pub(crate) use repository::insert_message;
