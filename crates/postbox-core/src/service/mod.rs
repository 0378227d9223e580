//! Service layer consumed by presentation front ends.
//!
//! One [`MailboxService`] per process is enough; it holds pool clones
//! of the same bounded store and is safe to share across tasks.

mod mail;

pub use mail::MailboxService;
