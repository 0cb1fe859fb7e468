//! Rewrite error types.

use std::fmt;

use thiserror::Error;

use crate::storage::{CommitId, StorageError};

/// Result type for rewrite operations.
pub type RewriteResult<T> = Result<T, RewriteError>;

/// Errors that abort a rewrite session.
#[derive(Debug, Error)]
pub enum RewriteError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A policy hook refused to continue.
    #[error("policy failure: {message}")]
    Policy { message: String },

    /// The session configuration cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The pre-pass thread pool could not be built.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// A commit was reached before one of its walked parents was rewritten.
    #[error("commit {commit} visited before its parent {parent}")]
    OutOfOrder { commit: CommitId, parent: CommitId },

    /// Symbolic refs nest deeper than git itself allows.
    #[error("symbolic ref chain too deep at {0}")]
    RefChainTooDeep(String),
}

impl RewriteError {
    /// Wrap any displayable failure raised inside a policy hook.
    pub fn policy(message: impl fmt::Display) -> Self {
        Self::Policy {
            message: message.to_string(),
        }
    }

    pub fn is_policy_failure(&self) -> bool {
        matches!(self, RewriteError::Policy { .. })
    }

    pub fn is_storage_failure(&self) -> bool {
        matches!(self, RewriteError::Storage(_))
    }

    /// Whether the run stopped on a tree entry name collision
    /// (only possible with `CollisionPolicy::Error`).
    pub fn is_duplicate_entry(&self) -> bool {
        matches!(self, RewriteError::Storage(StorageError::DuplicateEntry { .. }))
    }
}
