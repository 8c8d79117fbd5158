//! Error types for storage operations

use std::error::Error;
use std::fmt;

use crate::models::VersionNumber;

/// Error type for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// Configuration error
    Configuration(String),

    /// Connection error
    Connection(String),

    /// Query error
    Query(String),

    /// Data not found
    NotFound(String),

    /// Item already exists
    AlreadyExists(String),

    /// An insert did not carry the next number of its sequence
    SequenceConflict {
        prompt_id: String,
        branch: String,
        expected: VersionNumber,
        attempted: VersionNumber,
    },

    /// A delete batch named HEAD or a pinned version; nothing was deleted
    ProtectedVersion {
        prompt_id: String,
        branch: String,
        version: VersionNumber,
        reason: String,
    },

    /// Serialization/deserialization error
    Serialization(String),

    /// Data conversion error
    Conversion(String),

    /// Internal error (poisoned lock, broken invariant in the backend)
    Internal(String),

    /// Other error
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            StorageError::Connection(msg) => write!(f, "Connection error: {}", msg),
            StorageError::Query(msg) => write!(f, "Query error: {}", msg),
            StorageError::NotFound(msg) => write!(f, "Not found: {}", msg),
            StorageError::AlreadyExists(msg) => write!(f, "Already exists: {}", msg),
            StorageError::SequenceConflict {
                prompt_id,
                branch,
                expected,
                attempted,
            } => write!(
                f,
                "Sequence conflict on {}/{}: expected version {}, got {}",
                prompt_id, branch, expected, attempted
            ),
            StorageError::ProtectedVersion {
                prompt_id,
                branch,
                version,
                reason,
            } => write!(
                f,
                "Refusing to delete protected version {}/{}/v{}: {}",
                prompt_id, branch, version, reason
            ),
            StorageError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::Conversion(msg) => write!(f, "Conversion error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
            StorageError::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl Error for StorageError {}

/// Convert a JSON error to a storage error
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Convert a standard IO error to a storage error
impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Other(err.to_string())
    }
}
