//! Domain-level errors

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while validating user input
#[derive(Debug, Error)]
pub enum DomainError {
    /// A field value is outside its accepted domain
    #[error("Invalid {field} '{value}': expected {expected}")]
    Invalid {
        /// Name of the offending field
        field: &'static str,
        /// Value as received
        value: String,
        /// Accepted set or range
        expected: String,
    },

    /// Path resolves outside every permitted base directory
    #[error("{purpose} path is outside allowed directories: {}", path.display())]
    UnsafePath { purpose: String, path: PathBuf },

    /// Input file does not exist
    #[error("{purpose} file not found: {}", path.display())]
    FileNotFound { purpose: String, path: PathBuf },

    /// Input path exists but is not a regular file
    #[error("{purpose} path is not a file: {}", path.display())]
    NotAFile { purpose: String, path: PathBuf },

    /// Input file exceeds the size limit
    #[error("{purpose} file too large: {size_mb:.1}MB (max {max_mb}MB)")]
    FileTooLarge {
        purpose: String,
        size_mb: f64,
        max_mb: u64,
    },

    /// Input file is not valid UTF-8
    #[error("{purpose} is not valid UTF-8: {reason}")]
    InvalidEncoding { purpose: String, reason: String },

    /// A required input was not supplied
    #[error("{0}")]
    MissingInput(String),
}

impl DomainError {
    /// Create an invalid field error
    pub fn invalid(
        field: &'static str,
        value: impl fmt::Display,
        expected: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            field,
            value: value.to_string(),
            expected: expected.into(),
        }
    }

    /// Create a file-too-large error from byte counts
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn file_too_large(purpose: impl Into<String>, size_bytes: u64, max_bytes: u64) -> Self {
        Self::FileTooLarge {
            purpose: purpose.into(),
            size_mb: size_bytes as f64 / 1_048_576.0,
            max_mb: max_bytes / 1_048_576,
        }
    }

    /// Name of the offending field, for invalid field errors
    #[must_use]
    pub const fn field(&self) -> Option<&'static str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether this error came from the path safety checks
    #[must_use]
    pub const fn is_path_error(&self) -> bool {
        matches!(
            self,
            Self::UnsafePath { .. }
                | Self::FileNotFound { .. }
                | Self::NotAFile { .. }
                | Self::FileTooLarge { .. }
        )
    }
}
