//! Per-user folder hierarchy.
//!
//! Five system folders are created at signup and are immutable; users
//! may nest custom folders under them. Deleting a folder never deletes
//! mail, it only clears the folder reference on the affected entries.

mod model;
mod repository;

pub use model::{Folder, FolderId, FolderSummary, SystemFolder};
pub use repository::FolderRepository;

pub(crate) use repository::system_folder_id;
