use thiserror::Error;

use crate::state::CollectionId;

/// Failures raised by the persistence layer itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("failed to write key '{key}': {reason}")]
    Write { key: String, reason: String },

    #[error("failed to read key '{key}': {reason}")]
    Read { key: String, reason: String },
}

/// Errors surfaced by [`Store`](crate::store::Store) operations.
///
/// None of these are fatal: validation and constraint failures leave state
/// untouched, not-found is a logged no-op, and storage failures degrade the
/// store to in-memory mode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{collection} has no entry with id '{id}'")]
    NotFound { collection: CollectionId, id: String },

    #[error("constraint violated: {0}")]
    ConstraintViolation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl StoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(collection: CollectionId, id: impl Into<String>) -> Self {
        Self::NotFound {
            collection,
            id: id.into(),
        }
    }
}

/// Setup-time errors for the reorder engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReorderError {
    #[error("reorder container '{0}' does not exist")]
    MissingContainer(String),
}
