//! Result and error types for covkit.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for covkit operations
pub type CoverageResult<T> = Result<T, CoverageError>;

/// Errors that can occur while collecting, merging or reporting coverage
#[derive(Debug, Error)]
pub enum CoverageError {
    /// Config file exists but is not valid JSON for [`crate::Config`]
    #[error("Failed to parse config {}: {source}", path.display())]
    ConfigParse {
        /// Config file path
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// Filesystem operation failed
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// Path the operation touched
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reporter name not registered
    #[error("Unknown reporter: {name}")]
    UnknownReporter {
        /// Requested reporter name
        name: String,
    },

    /// Record violates the counts/locations invariant
    #[error("Invalid coverage record for {path}: {message}")]
    InvalidRecord {
        /// File path of the record
        path: String,
        /// What is wrong with it
        message: String,
    },

    /// Include/exclude glob failed to compile
    #[error("Invalid glob pattern {pattern:?}: {message}")]
    Pattern {
        /// Offending pattern
        pattern: String,
        /// Error message
        message: String,
    },

    /// Session or run name cannot name an output file or directory
    #[error("Invalid name {name:?}: {reason}")]
    InvalidName {
        /// Rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// The termination signal handler could not be installed
    #[error("Failed to install termination handler: {message}")]
    SignalHandler {
        /// Error message
        message: String,
    },

    /// Operation called in the wrong session state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },
}

impl CoverageError {
    /// Create an I/O error tagged with the path it concerns
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create an invalid record error
    #[must_use]
    pub fn invalid_record(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid name error
    #[must_use]
    pub fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid state error
    #[must_use]
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_carries_path() {
        let err = CoverageError::io(
            "/tmp/coverage/raw",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/coverage/raw"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_invalid_record_error() {
        let err = CoverageError::invalid_record("/src/a.js", "s has 2 keys, statementMap has 3");
        assert!(err.to_string().contains("/src/a.js"));
        assert!(err.to_string().contains("statementMap"));
    }

    #[test]
    fn test_unknown_reporter_error() {
        let err = CoverageError::UnknownReporter {
            name: "clover".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown reporter: clover");
    }

    #[test]
    fn test_invalid_name_error() {
        let err = CoverageError::invalid_name("../x", "must be a single path segment");
        assert_eq!(
            err.to_string(),
            r#"Invalid name "../x": must be a single path segment"#
        );
    }

    #[test]
    fn test_json_error_from() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: CoverageError = json_err.into();
        assert!(err.to_string().contains("JSON"));
    }
}
