//! Database error type shared by the storage crates.
//!
//! `RusqliteErrorExt` maps raw SQLite failures onto [`DatabaseError`] so callers
//! can tell transient contention from real faults.

use thiserror::Error;

/// Database/storage errors (SQLite, local state).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_) => {
                "Unable to access local data. Check the database path."
            }
            DatabaseError::QueryFailed(_) => "A data operation failed. Please try again.",
            DatabaseError::Busy(_) => "The database is busy. Please try again.",
            DatabaseError::Corruption(_) => {
                "Local data may be corrupted. Consider resetting the database."
            }
            DatabaseError::Constraint(_) => "The data conflicts with existing records.",
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Busy(_))
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        use rusqlite::ErrorCode;

        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
            {
                DatabaseError::Busy(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                DatabaseError::Constraint(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(err.code, ErrorCode::CannotOpen | ErrorCode::NotADatabase) =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
