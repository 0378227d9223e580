//! Attachment metadata bookkeeping.
//!
//! Only the metadata lives here (name, size, mime type, path
//! reference); storing and serving the file bytes is another
//! subsystem's job, and mailbox delivery works without any of it.

mod model;
mod repository;

pub use model::{Attachment, AttachmentId};
pub use repository::AttachmentRepository;
