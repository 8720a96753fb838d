//! Error types for the persistence seams.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Could not reach the backing store. Transient.
    #[error("store connection error: {0}")]
    Connection(String),

    /// A compare-and-swap write lost the race.
    ///
    /// Expected under concurrent reconciliation; callers retry with a
    /// fresh read, up to a bound.
    #[error("write conflict on {key}")]
    Conflict {
        /// Render of the contended key.
        key: String,
    },

    /// Stored bytes could not be decoded, or a value could not be
    /// encoded.
    #[error("store serialization error: {0}")]
    Serialization(String),

    /// The requested record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The operation exceeded its deadline.
    #[error("store operation timed out: {0}")]
    Timeout(String),
}

impl StoreError {
    /// Creates a conflict error for a key.
    pub fn conflict(key: impl std::fmt::Display) -> Self {
        Self::Conflict {
            key: key.to_string(),
        }
    }

    /// Returns whether the operation can be retried as-is.
    ///
    /// Conflicts are retryable but need a fresh read first, which is why
    /// they are not classed as transient here.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Returns the error kind as a static string for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Conflict { .. } => "conflict",
            Self::Serialization(_) => "serialization",
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_not_transient() {
        assert!(!StoreError::conflict("t/u-1/mfa_gap").is_transient());
        assert!(StoreError::Connection("down".into()).is_transient());
    }

    #[test]
    fn conflict_renders_key() {
        let err = StoreError::conflict("t/u-1/mfa_gap");
        assert_eq!(err.to_string(), "write conflict on t/u-1/mfa_gap");
        assert_eq!(err.kind(), "conflict");
    }
}
