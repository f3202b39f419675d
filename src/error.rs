//! Error types for the block index.
//!
//! Errors fall into two classes:
//!
//! - **Recoverable**: [`IndexError::OutOfMemory`], [`IndexError::DuplicateIdentity`],
//!   [`IndexError::UnknownFile`], [`IndexError::DigestLength`] and [`IndexError::Config`].
//!   The index is left exactly as it was before the failing call, so the caller may
//!   retry or abandon the current insertion stream.
//! - **Fatal**: [`IndexError::InvariantViolation`]. The caller broke a precondition or
//!   the structure is corrupted. Continuing risks silent data loss in downstream dedupe
//!   actions, so callers should stop rather than try to recover.

use thiserror::Error;

use crate::filerec::FileId;

/// Result alias used throughout the crate.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors produced by the hash index and file registry.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A fallible allocation failed while inserting a block.
    #[error("out of memory while inserting block")]
    OutOfMemory,

    /// The file identity is already registered.
    #[error("file identity {0} is already registered")]
    DuplicateIdentity(FileId),

    /// The file identity is not registered.
    #[error("file identity {0} is not registered")]
    UnknownFile(FileId),

    /// A digest did not have the configured length.
    #[error("digest length mismatch: expected {expected} bytes, got {actual}")]
    DigestLength {
        /// Configured digest length
        expected: usize,
        /// Length of the rejected digest
        actual: usize,
    },

    /// A structural invariant was broken. Treat as fatal.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl IndexError {
    /// Whether this error signals a programming error or corrupted structure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

impl From<std::collections::TryReserveError> for IndexError {
    fn from(_: std::collections::TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

impl From<figment::Error> for IndexError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_invariant_violation_is_fatal() {
        assert!(IndexError::invariant("boom").is_fatal());
        assert!(!IndexError::OutOfMemory.is_fatal());
        assert!(!IndexError::DuplicateIdentity(FileId(3)).is_fatal());
        assert!(!IndexError::UnknownFile(FileId(3)).is_fatal());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            IndexError::DuplicateIdentity(FileId(42)).to_string(),
            "file identity 42 is already registered"
        );
        assert_eq!(
            IndexError::DigestLength {
                expected: 32,
                actual: 16
            }
            .to_string(),
            "digest length mismatch: expected 32 bytes, got 16"
        );
    }

    #[test]
    fn test_try_reserve_maps_to_oom() {
        let mut v: Vec<u8> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert!(matches!(IndexError::from(err), IndexError::OutOfMemory));
    }
}
