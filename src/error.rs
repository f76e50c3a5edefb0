// src/error.rs

//! Crate-wide error type and result alias

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while tracking repositories
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration
    #[error("{0}")]
    ConfigError(String),

    /// Repository pass failed before completion
    #[error("{0}")]
    TrackerError(String),

    /// Remote fetch failed
    #[error("{0}")]
    DownloadError(String),

    /// Local filesystem operation failed
    #[error("{0}")]
    IoError(String),

    /// Manifest or index could not be parsed
    #[error("{0}")]
    ParseError(String),

    /// Requested entity does not exist
    #[error("{0}")]
    NotFoundError(String),

    /// The tracking run was cancelled
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this error is a cancellation signal rather than a failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_passes_message_through() {
        let err = Error::TrackerError("error cloning repository: timeout".to_string());
        assert_eq!(err.to_string(), "error cloning repository: timeout");
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::IoError("boom".to_string()).is_cancelled());
    }
}
