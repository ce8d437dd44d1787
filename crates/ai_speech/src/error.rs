//! Speech processing errors

use std::path::PathBuf;

use domain::DomainError;
use thiserror::Error;

use crate::retry::Retryable;

/// Errors that can occur during speech synthesis and model management
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Input failed validation or path safety checks
    #[error(transparent)]
    Validation(#[from] DomainError),

    /// A required local model file is missing
    #[error("Model file not found: {}", .0.display())]
    ModelFileNotFound(PathBuf),

    /// No MP3 encoder is available
    #[error("MP3 encoding unavailable: {0}")]
    EncodingUnavailable(String),

    /// The audio encoder failed
    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    /// Fetching a model file failed
    #[error("Failed to fetch {file} from {repo}: {reason}")]
    NetworkFetch {
        /// Remote repository identifier
        repo: String,
        /// File within the repository
        file: String,
        /// Underlying failure
        reason: String,
        /// Whether another attempt may succeed
        retryable: bool,
    },

    /// TLS certificate validation failed while fetching a model file
    #[error("Certificate verification failed while fetching {file} from {repo}: {reason}")]
    Certificate {
        /// Remote repository identifier
        repo: String,
        /// File within the repository
        file: String,
        /// Underlying failure
        reason: String,
    },

    /// The inference engine failed
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// Engine not available (not installed or configured)
    #[error("Provider not available: {0}")]
    NotAvailable(String),

    /// Engine produced output that could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A bounded operation ran out of time
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// What was running
        operation: &'static str,
        /// Limit that was hit
        timeout_ms: u64,
    },

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpeechError {
    /// Remediation guidance to show alongside the error, if any
    #[must_use]
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::Certificate { repo, .. } => Some(certificate_remediation(repo)),
            Self::EncodingUnavailable(_) => {
                Some("Install ffmpeg and add it to your PATH, or write WAV output instead.".into())
            },
            _ => None,
        }
    }
}

impl Retryable for SpeechError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::NetworkFetch { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Manual download instructions for environments that intercept TLS
#[must_use]
pub fn certificate_remediation(repo: &str) -> String {
    format!(
        "Your network rejected the TLS certificate of the model host (common behind \
         corporate proxies). Either trust the proxy's CA certificate, or download the \
         files manually from https://huggingface.co/{repo}:\n\
         \x20 models/\n\
         \x20 ├── kokoro-82m/\n\
         \x20 │   ├── config.json\n\
         \x20 │   └── kokoro-v1_0.pth\n\
         \x20 └── voices/\n\
         \x20     ├── af_heart.pt\n\
         \x20     └── ... (other voice files)"
    )
}
