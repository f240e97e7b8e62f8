//! Application error types.
//!
//! Every core operation returns `Result<_, AppError>`. The variants form the
//! error taxonomy shared by the store, the services and the HTTP layer; they
//! serialize to a tagged JSON object so callers can match on the kind without
//! parsing messages.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

/// Sub-kind of a [`AppError::Conflict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictKind {
    /// An entity with the same identifier already exists.
    Exists,
    /// The pull request is merged and can no longer be mutated.
    PrMerged,
    /// The reviewer is not assigned to the pull request.
    NotAssigned,
    /// No eligible replacement or initial reviewer is available.
    NoCandidate,
    /// The pull request changed between read and write.
    ConcurrentModification,
}

impl ConflictKind {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Exists => "PR_EXISTS",
            Self::PrMerged => "PR_MERGED",
            Self::NotAssigned => "NOT_ASSIGNED",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Flat view of the taxonomy, handy for `match` and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict(ConflictKind),
    StorageFailure,
    InvalidInput,
    Internal,
}

/// Application-level errors.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Referenced user, team or pull request is absent.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// The operation conflicts with the current state.
    #[error("Conflict ({kind}): {message}")]
    Conflict { kind: ConflictKind, message: String },

    /// Underlying store failed; `message` carries the cause.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        operation: Option<String>,
        #[source]
        #[serde(skip)]
        source: Option<Arc<sqlx::Error>>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a storage error with optional operation context.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            operation: None,
            source: None,
        }
    }

    /// Create a storage error with operation context.
    pub fn storage_with_op(message: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            operation: Some(operation.into()),
            source: None,
        }
    }

    /// Wrap a driver error, keeping it as the source.
    pub fn sqlx(err: sqlx::Error, operation: Option<&str>) -> Self {
        Self::Storage {
            message: err.to_string(),
            operation: operation.map(str::to_string),
            source: Some(Arc::new(err)),
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create a conflict error.
    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self::Conflict {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { kind, .. } => ErrorKind::Conflict(*kind),
            Self::Storage { .. } => ErrorKind::StorageFailure,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Check if this is a conflict of the given kind.
    pub fn is_conflict(&self, expected: ConflictKind) -> bool {
        matches!(self, Self::Conflict { kind, .. } if *kind == expected)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::sqlx(err, None)
    }
}

impl From<crate::db::DbError> for AppError {
    fn from(err: crate::db::DbError) -> Self {
        match err {
            crate::db::DbError::Sqlite(e) => Self::sqlx(e, None),
            other => Self::storage(other.to_string()),
        }
    }
}
