//! Error types for shardtopo
//!
//! Every failure a topology operation can surface is a variant of [`Error`].
//! Store and lock failures are wrapped with operation context through
//! [`ResultExt`] so the message names the keyspace/shard and the call, while
//! [`Error::is_not_found`] and [`Error::code`] still see the underlying kind.

use crate::types::{NameError, Version};
use thiserror::Error;

/// Common result type for shardtopo operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for shardtopo
#[derive(Debug, Error)]
pub enum Error {
    // Input errors
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Store errors
    #[error("node doesn't exist: {0}")]
    NotFound(String),

    #[error("node already exists: {0}")]
    AlreadyExists(String),

    #[error("bad node version for {path}: expected {expected}")]
    Conflict { path: String, expected: Version },

    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("timed out: {0}")]
    Timeout(String),

    // Coordination errors
    #[error("{resource} is not locked: {reason}")]
    NotLocked { resource: String, reason: String },

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    // Internal errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{context}: {source}")]
    Context { context: String, source: Box<Error> },
}

/// Broad failure class, one per caller-side remedy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Fix the input
    InvalidArgument,
    /// The record is absent
    NotFound,
    /// The record is already present
    AlreadyExists,
    /// Re-read and retry
    Conflict,
    /// Take the lock before mutating
    NotLocked,
    /// A structural invariant of the topology is violated
    FailedPrecondition,
    /// Stored bytes could not be decoded
    Corrupt,
    /// The store did not answer in time or failed
    Unavailable,
    /// Bug or misconfiguration
    Internal,
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a failed precondition error
    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Wrap this error with a description of the failing operation
    #[must_use]
    pub fn wrap(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        let mut err = self;
        while let Self::Context { source, .. } = err {
            err = source;
        }
        err
    }

    /// Check if this is a not found error
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.root_cause(), Self::NotFound(_))
    }

    /// Check if this is an optimistic-concurrency version mismatch
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self.root_cause(), Self::Conflict { .. })
    }

    /// Check if the caller may retry the operation after re-reading state
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Conflict { .. } | Self::Timeout(_)
        )
    }

    /// Classify the error by the remedy it requires
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self.root_cause() {
            Self::InvalidName(_) | Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::NotLocked { .. } => ErrorCode::NotLocked,
            Self::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            Self::Corrupt { .. } => ErrorCode::Corrupt,
            Self::Storage(_) | Self::Timeout(_) => ErrorCode::Unavailable,
            Self::Serialization(_) | Self::Configuration(_) | Self::Context { .. } => {
                ErrorCode::Internal
            }
        }
    }
}

/// Attach operation context to a failed result
pub trait ResultExt<T> {
    /// Wrap the error, if any, with a fixed context string
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error, if any, with a lazily built context string
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.wrap(context))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.wrap(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_not_found_through_context() {
        let err = Error::NotFound("keyspaces/ks/Keyspace".into())
            .wrap("GetKeyspace(ks)")
            .wrap("failed to get list of shards for keyspace 'ks'");
        assert!(err.is_not_found());
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.to_string().starts_with("failed to get list of shards"));
        assert!(err.to_string().ends_with("node doesn't exist: keyspaces/ks/Keyspace"));
    }

    #[test]
    fn test_error_retryable() {
        let conflict = Error::Conflict {
            path: "p".into(),
            expected: Version::new(3),
        };
        assert!(conflict.is_retryable());
        assert!(conflict.is_conflict());
        assert!(Error::Timeout("get".into()).is_retryable());
        assert!(!Error::invalid_argument("bad").is_retryable());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::NotLocked {
                resource: "keyspaces/ks".into(),
                reason: "no lock held".into()
            }
            .code(),
            ErrorCode::NotLocked
        );
        assert_eq!(
            Error::failed_precondition("no serving shards").code(),
            ErrorCode::FailedPrecondition
        );
        assert_eq!(
            Error::Corrupt {
                path: "p".into(),
                reason: "eof".into()
            }
            .code(),
            ErrorCode::Corrupt
        );
    }

    #[test]
    fn test_result_context() {
        let res: Result<()> = Err(Error::storage("disk on fire"));
        let err = res.with_context(|| format!("GetShard({}, {}) failed", "ks", "-80"));
        let err = err.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert_eq!(
            err.to_string(),
            "GetShard(ks, -80) failed: storage error: disk on fire"
        );
    }
}
