//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Input failed validation (blank subject/body, malformed name).
    /// Never worth retrying.
    #[error("validation error: {0}")]
    Validation(String),

    /// No user exists with the given recipient name.
    #[error("recipient not found: {0}")]
    RecipientNotFound(String),

    /// A user attempted to send a message to themselves.
    #[error("cannot send a message to yourself")]
    SelfSendNotAllowed,

    /// The requested user name is already registered.
    #[error("user name already taken: {0}")]
    NameTaken(String),

    /// The entry or folder does not exist, or is not owned by the caller.
    /// The two cases are deliberately indistinguishable so that callers
    /// cannot probe for other users' data.
    #[error("entry or folder not found")]
    NotFound,

    /// System folders cannot be renamed or deleted.
    #[error("system folders cannot be renamed or deleted")]
    SystemFolder,

    /// The store's connection pool is exhausted. Safe to retry with
    /// backoff.
    #[error("store resources exhausted, retry later")]
    ResourceExhausted,

    /// A store call exceeded its deadline. Safe to retry with backoff.
    #[error("store operation timed out")]
    Timeout,

    /// The store returned something that violates an invariant, e.g. no
    /// generated key after an insert. Should never occur absent
    /// corruption.
    #[error("store inconsistency: {0}")]
    StoreInconsistency(&'static str),

    /// A send failed after the message row was inserted; the whole
    /// transaction was rolled back. Carries the original cause.
    #[error("send failed: {0}")]
    SendFailed(#[source] Box<Error>),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::ResourceExhausted,
            sqlx::Error::Io(ref io) if io.kind() == std::io::ErrorKind::TimedOut => Self::Timeout,
            other => Self::Database(other),
        }
    }
}

impl Error {
    /// Whether the caller may retry the operation with backoff.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhausted | Self::Timeout)
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_resource_exhausted() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::ResourceExhausted));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_io_deadline_maps_to_timeout() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline elapsed");
        let err = Error::from(sqlx::Error::Io(io));
        assert!(matches!(err, Error::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_database_errors_are_not_retryable() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }
}
