//! Core error types for Stakeledger.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer.

use thiserror::Error;

use crate::governor::GovernorError;
use crate::ingest::IngestError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the ownership pipeline.
///
/// Database-specific errors are wrapped in string form to keep this type
/// database-agnostic.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Input validation failed: {0}")]
    Validation(String),

    #[error("Request governor error: {0}")]
    Governor(#[from] GovernorError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Failed to load configuration: {0}")]
    ConfigIO(String),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    /// True when a concurrent writer got in the way of this operation.
    ///
    /// Conflicts are the only storage failures the pipeline retries.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Database(DatabaseError::WriteConflict(_)))
    }
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A foreign key constraint was violated.
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Another writer held the row or the database lock.
    #[error("Write conflict: {0}")]
    WriteConflict(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_conflict_is_conflict() {
        let err = Error::Database(DatabaseError::WriteConflict("busy".to_string()));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_other_database_errors_are_not_conflicts() {
        let err = Error::Database(DatabaseError::QueryFailed("syntax".to_string()));
        assert!(!err.is_conflict());
        assert!(!Error::ConstraintViolation("fk".to_string()).is_conflict());
    }

    #[test]
    fn test_error_display() {
        let err = Error::Database(DatabaseError::NotFound("holder h_1".to_string()));
        assert_eq!(
            err.to_string(),
            "Database operation failed: Record not found: holder h_1"
        );
    }
}
