//! Storage layer error types
//!
//! All errors that can occur while reading or writing the object stores are
//! defined here. We use `thiserror` for ergonomic error definition and better
//! error messages

use std::path::PathBuf;

use bstr::BString;
use thiserror::Error;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// the requested ref does not exist
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// the requested object does not exist in the store
    #[error("object not found: {0}")]
    ObjectNotFound(git2::Oid),

    /// an object had a different type than the caller needed
    #[error("unexpected object type for {id}: expected {expected}, found {found}")]
    UnexpectedObjectType {
        id: git2::Oid,
        expected: String,
        found: String,
    },

    /// data integrity check failed
    #[error("corrupted data at {path}: {reason}")]
    CorruptedData { path: String, reason: String },

    /// two entries of one tree ended up with the same name
    #[error("duplicate tree entry {name:?} in {path:?}")]
    DuplicateEntry { path: BString, name: BString },

    /// a ref was moved by another writer while we updated it
    #[error("concurrent modification: ref {reference} was updated by another writer")]
    ConcurrentModification { reference: String },

    /// repo could not be opened
    #[error("repository not initialized: {0}")]
    NotInitialized(PathBuf),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::RefNotFound(_) | StorageError::ObjectNotFound(_) => true,
            StorageError::Git(e) => e.code() == git2::ErrorCode::NotFound,
            _ => false,
        }
    }

    /// check if this error is a conflict with another writer
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StorageError::ConcurrentModification { .. } | StorageError::DuplicateEntry { .. }
        )
    }

    /// Map a failed ref write, singling out lost update races.
    pub(crate) fn from_ref_update(reference: &str, err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::Modified | git2::ErrorCode::Locked => {
                StorageError::ConcurrentModification {
                    reference: reference.to_string(),
                }
            }
            git2::ErrorCode::NotFound => StorageError::RefNotFound(reference.to_string()),
            _ => StorageError::Git(err),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
