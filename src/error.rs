//! Unified error hierarchy.
//!
//! Every fallible operation in the crate surfaces one of the kinds below.
//! The core never panics or aborts on a recoverable failure; internal
//! invariant violations are reported as [`IndexError::Internal`] and logged
//! at the site that detected them.

use crate::types::Label;
use thiserror::Error;

/// The unified error type for all index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Bad caller input: dimension mismatch, `k = 0`, empty query, unknown
    /// metric/type pairing at construction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The label is already mapped and no in-place update was requested.
    #[error("label {0} already exists")]
    AlreadyExists(Label),

    /// The label has no live mapping.
    #[error("label {0} not found")]
    NotFound(Label),

    /// `max_elements` reached with no vacant slot available.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The requested facility is disabled or unsupported for this
    /// configuration (vacant reuse off, rejected kernel combination,
    /// engine not built in-core).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Failure in the persistence layer; carries the underlying message.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Load-time version, type, or dimension inconsistency.
    #[error("format mismatch: {0}")]
    FormatMismatch(String),

    /// Violated internal invariant. Not swallowed; callers should treat the
    /// index as suspect.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    /// True if the error indicates caller misuse rather than engine state.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, IndexError::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_context() {
        let e = IndexError::NotFound(42);
        assert_eq!(e.to_string(), "label 42 not found");

        let e = IndexError::FormatMismatch("dimension 4 != 8".into());
        assert!(e.to_string().contains("dimension 4 != 8"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let e: IndexError = io.into();
        assert!(matches!(e, IndexError::Io(_)));
    }
}
