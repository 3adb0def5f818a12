//! # Error Module
//!
//! One error type for the whole core. The app layer maps each variant to an
//! HTTP status.

use crate::status::ScoreCardStatus;
use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, AppraisalError>;

/// Errors raised by the appraisal core.
#[derive(Debug, Error)]
pub enum AppraisalError {
    /// A record does not exist.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    /// Input failed a business rule (user-facing message).
    #[error("{0}")]
    Validation(String),

    /// The operation is not allowed in the score card's current status.
    #[error("cannot {action} while score card is '{from}'")]
    InvalidTransition {
        action: &'static str,
        from: ScoreCardStatus,
    },

    /// The actor may not perform this operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness or optimistic-version conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Embedded database failure.
    #[error("storage error: {0}")]
    Storage(#[from] redb::Error),

    /// Record or snapshot encoding failure.
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl AppraisalError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}

// redb splits its errors per stage; fold each into `redb::Error` so `?` works
// on any of them.
macro_rules! from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AppraisalError {
                fn from(err: $ty) -> Self {
                    Self::Storage(err.into())
                }
            }
        )*
    };
}

from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<postcard::Error> for AppraisalError {
    fn from(err: postcard::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<serde_json::Error> for AppraisalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err.to_string())
    }
}
