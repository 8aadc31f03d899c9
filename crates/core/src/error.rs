//! Error types for the vault domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`PaginationError`] - Rejected pagination requests (caller errors)
//! - [`StorageError`] - Database/repository errors, tagged with the operation
//! - [`VaultError`] - Top-level error surfaced to the query API
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::EntityType;

// =============================================================================
// Pagination Errors
// =============================================================================

/// Pagination request validation failures.
///
/// These are always caused by the caller and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    /// Neither (or both) of `first` and `last` was supplied.
    #[error("Missing page size: exactly one of `first` or `last` must be provided")]
    MissingPageSize,

    /// The requested page size is outside the accepted range.
    #[error("Invalid page size {size}: must be between {min} and {max}")]
    InvalidPageSize {
        /// Requested size.
        size: i32,
        /// Smallest accepted size.
        min: i32,
        /// Largest accepted size.
        max: i32,
    },

    /// The cursor could not be decoded for the paginated entity type.
    #[error("Invalid cursor for {entity}: {reason}")]
    InvalidCursor {
        /// Entity type being paginated.
        entity: EntityType,
        /// What was wrong with the cursor.
        reason: String,
    },

    /// Both `after` and `before` were supplied.
    #[error("Conflicting cursors: `after` and `before` cannot be combined")]
    ConflictingCursors,
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and repository errors.
///
/// Every variant that can come out of a query carries the name of the
/// repository operation that failed (e.g. `list_credentials`).
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error in {operation}: {message}")]
    QueryError {
        /// Repository operation that issued the query.
        operation: &'static str,
        /// Driver error message.
        message: String,
    },

    /// Requested record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type that was looked up.
        entity: EntityType,
        /// Identifier that was looked up.
        id: String,
    },

    /// Database constraint was violated (unique, foreign key, etc.).
    #[error("Constraint violation in {operation}: {message}")]
    ConstraintViolation {
        /// Repository operation that issued the write.
        operation: &'static str,
        /// Driver error message.
        message: String,
    },

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error in {operation}: {message}")]
    TransactionError {
        /// Repository operation that owned the transaction.
        operation: &'static str,
        /// Driver error message.
        message: String,
    },

    /// A stored row could not be mapped back into a domain model.
    #[error("Malformed row in {operation}: {message}")]
    SerializationError {
        /// Repository operation that read the row.
        operation: &'static str,
        /// What was wrong with the row.
        message: String,
    },
}

impl StorageError {
    /// Shorthand for a [`StorageError::NotFound`].
    pub fn not_found(entity: EntityType, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for a [`StorageError::QueryError`].
    pub fn query(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::QueryError {
            operation,
            message: err.to_string(),
        }
    }

    /// Shorthand for a [`StorageError::SerializationError`].
    pub fn malformed(operation: &'static str, message: impl Into<String>) -> Self {
        Self::SerializationError {
            operation,
            message: message.into(),
        }
    }
}

// =============================================================================
// Vault Errors
// =============================================================================

/// Top-level error returned by [`crate::services::QueryService`].
///
/// Validation, not-found and storage failures are distinct variants so the
/// query API can map them to different externally visible statuses.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Pagination request was rejected.
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// A single-item lookup or update targeted a missing item.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type that was looked up.
        entity: EntityType,
        /// Identifier that was looked up.
        id: String,
    },

    /// No agent is registered for the tenant.
    #[error("No agent registered for tenant {0}")]
    UnknownTenant(String),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for VaultError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { entity, id } => Self::NotFound { entity, id },
            other => Self::Storage(other),
        }
    }
}

impl VaultError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pagination(PaginationError::MissingPageSize) => "MISSING_PAGE_SIZE",
            Self::Pagination(PaginationError::InvalidPageSize { .. }) => "INVALID_PAGE_SIZE",
            Self::Pagination(PaginationError::InvalidCursor { .. }) => "INVALID_CURSOR",
            Self::Pagination(PaginationError::ConflictingCursors) => "CONFLICTING_CURSORS",
            Self::NotFound { .. } | Self::UnknownTenant(_) => "NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for query service operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Result type for pagination validation.
pub type PaginationResult<T> = Result<T, PaginationError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_keeps_its_own_kind() {
        let err: VaultError = StorageError::not_found(EntityType::Proof, "p-1").into();
        assert!(matches!(err, VaultError::NotFound { .. }));
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("p-1"));
    }

    #[test]
    fn test_storage_error_names_operation() {
        let err: VaultError = StorageError::query("list_jobs", "disk I/O error").into();
        assert_eq!(err.code(), "STORAGE_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("list_jobs") && msg.contains("disk I/O error"));
    }

    #[test]
    fn test_pagination_codes_are_distinct() {
        let missing: VaultError = PaginationError::MissingPageSize.into();
        let conflicting: VaultError = PaginationError::ConflictingCursors.into();
        assert_ne!(missing.code(), conflicting.code());
    }
}
