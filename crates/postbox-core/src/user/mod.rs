//! User accounts and recipient resolution.
//!
//! Creating a user also bootstraps their five system folders inside the
//! same transaction; the rest of the crate relies on those folders
//! existing and never creates them lazily.

mod model;
mod repository;

pub use model::{User, UserId};
pub use repository::UserRepository;
