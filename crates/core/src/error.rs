//! Error types for document-backed collections
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Expected sub-document outcomes (CAS mismatch, path not found) are NOT
//! errors at the store boundary; they are variants of
//! [`MutationOutcome`](crate::types::MutationOutcome). The collection layer
//! decides which of them become errors.

use thiserror::Error;

/// Result type alias for collection and store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for collections and their backing store
#[derive(Debug, Error)]
pub enum Error {
    /// Logical index has no element in the current document
    #[error("Index out of bounds: {index}")]
    IndexOutOfBounds {
        /// The requested index
        index: usize,
    },

    /// A cursor detected a write it did not perform
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// Bounded CAS retry loop gave up
    #[error("Conflict storm: couldn't perform {operation} in less than {attempts} attempts")]
    ConflictStorm {
        /// Operation that was being retried
        operation: &'static str,
        /// Number of attempts made
        attempts: usize,
    },

    /// Element type not storable in this collection
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Map key not usable as a sub-document path
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Operation not legal in the current cursor state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Document does not exist
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Document already exists (insert)
    #[error("Document already exists: {0}")]
    DocumentExists(String),

    /// Backing document holds a value of the wrong shape
    #[error("Document {key} holds {found}, expected {expected}")]
    UnexpectedShape {
        /// Document key
        key: String,
        /// Expected JSON type
        expected: &'static str,
        /// JSON type found
        found: &'static str,
    },

    /// Store rejected a path as not applicable to the document
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend or transport failure
    ///
    /// Passed through unchanged; retry loops never absorb it.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration could not be read or is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for failures caused by another writer racing this one
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::ConcurrentModification(_) | Error::ConflictStorm { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
