//! Engine-level error types.

use thiserror::Error;

/// Errors surfaced by the task service and scheduler.
///
/// Firing failures are *not* errors — they are recorded as ordinary result
/// rows and observed through the results endpoint.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed input: bad URL, past instant, unparseable cron, empty name.
    /// Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced task does not exist.
    #[error("task not found")]
    NotFound,

    /// Invalid state transition or duplicate create.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persistence failure from the db crate.
    #[error("database error: {0}")]
    Database(db::DbError),

    /// Programmer error, e.g. a stored row that no longer decodes.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<db::DbError> for EngineError {
    fn from(err: db::DbError) -> Self {
        match err {
            db::DbError::NotFound => Self::NotFound,
            db::DbError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other),
        }
    }
}
