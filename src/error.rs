//! Centralized error types for rigscan.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the rigscan library.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Invalid or incomplete configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The mail drop directory does not exist.
    #[error("Mail directory not found: {0}")]
    MaildirNotFound(PathBuf),

    /// A message file could not be parsed.
    #[error("Failed to parse message '{id}': {reason}")]
    MessageParse { id: String, reason: String },

    /// The processed-message log could not be read or written.
    #[error("Processed log error at '{path}': {reason}")]
    Tracker { path: PathBuf, reason: String },

    /// An attachment could not be persisted.
    #[error("Attachment storage error for '{filename}': {reason}")]
    Storage { filename: String, reason: String },
}

/// Convenience alias for `Result<T, ScanError>`.
pub type Result<T> = std::result::Result<T, ScanError>;

impl ScanError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ScanError`
/// when no path context is available (rare — prefer `ScanError::io`).
impl From<std::io::Error> for ScanError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
