//! Mailbox fan-out and per-entry state.
//!
//! This is the heart of the crate: one authored message becomes one
//! mailbox entry per party (sender, receiver) inside a single
//! transaction, and every later mutation touches exactly one entry
//! without affecting the other party's copy.

mod model;
mod repository;

pub use model::{MailboxEntry, MailboxStats, MessageView, Role};
pub use repository::MailboxRepository;
