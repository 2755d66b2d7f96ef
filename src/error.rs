//! Error taxonomy for the snippet library.
//!
//! Library operations return [`LibraryError`]; the binary wraps them in
//! `anyhow` for reporting. Validation and not-found errors are surfaced to the
//! caller as-is and never retried.

use thiserror::Error;

pub type Result<T, E = LibraryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum LibraryError {
    /// A required field is empty or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Reported only by an explicit consistency check.
    #[error(
        "search index is inconsistent with the store: {missing} missing, {orphaned} orphaned, {stale} stale"
    )]
    Inconsistency {
        missing: usize,
        orphaned: usize,
        stale: usize,
    },

    #[error("database error: {0}")]
    Database(sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LibraryError {
    pub fn snippet_not_found(id: i64) -> Self {
        LibraryError::NotFound {
            entity: "snippet",
            id: id.to_string(),
        }
    }

    pub fn tag_not_found(name: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity: "tag",
            id: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LibraryError::NotFound { .. })
    }
}

impl From<sqlx::Error> for LibraryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                LibraryError::Conflict(db_err.message().to_string())
            }
            _ => LibraryError::Database(err),
        }
    }
}
