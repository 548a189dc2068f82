//! src/error.rs
//! ============================================================================
//! # `FlistError`: Unified Error Type for the File-List Engine
//!
//! Every fallible engine operation returns `FlistResult<T>`. Soft outcomes
//! (a local filter that would hide everything, a comparison that found
//! nothing) are not errors and live next to the operations that produce them.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Convenient alias carrying the unified error type
pub type FlistResult<T> = Result<T, FlistError>;

/// Unified error type for all file-list operations.
#[derive(Debug, Error)]
pub enum FlistError {
    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error retrieving file or directory metadata.
    #[error("Filesystem metadata error on {path:?}: {source}")]
    FsMetadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permissions error for file/directory access.
    #[error("Permission denied: {0:?}")]
    PermissionDenied(PathBuf),

    /// Requested file or directory does not exist.
    #[error("File or directory not found: {0:?}")]
    NotFound(PathBuf),

    /// Filter or sort-group pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Growing an entry array failed; the previous array is intact.
    #[error("Allocation of {requested} entries failed")]
    AllocationFailure { requested: usize },

    /// Recursive walk could not continue (loops, unreadable roots).
    #[error("Tree walk failed at {path:?}: {reason}")]
    TreeWalk { path: PathBuf, reason: String },

    /// Operation cancelled by the caller's cancellation flag.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Input validation errors
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file I/O error with path.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serialization or deserialization error (session files).
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl FlistError {
    /// Create a pattern compilation error
    pub fn invalid_pattern<S1: Into<String>, S2: ToString>(pattern: S1, reason: S2) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an input validation error
    pub fn invalid_input<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a tree walk failure error
    pub fn tree_walk<P: Into<PathBuf>, S: Into<String>>(path: P, reason: S) -> Self {
        Self::TreeWalk {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Classify an `io::Error` raised while touching `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path: PathBuf = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::FsMetadata { path, source },
        }
    }

    /// Whether the caller may keep going with the rest of its work.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidPattern { .. }
                | Self::NotFound(_)
                | Self::PermissionDenied(_)
                | Self::InvalidInput { .. }
                | Self::Cancelled
        )
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for FlistError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let err = FlistError::from_io("/nope", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FlistError::NotFound(_)));

        let err = FlistError::from_io("/root", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FlistError::PermissionDenied(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_pattern_error_keeps_text() {
        let err = FlistError::invalid_pattern("a(b", "unclosed group");
        assert_eq!(err.to_string(), "Invalid pattern 'a(b': unclosed group");
        assert!(!FlistError::AllocationFailure { requested: 4 }.is_recoverable());
    }
}
