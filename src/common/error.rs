//! Error types for the tester
//!
//! Step-level variants are turned into failed step results by the
//! interpreter; only link-open and discovery failures end a run.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the tester
#[derive(Error, Debug)]
pub enum Error {
    // === Device Link Errors ===
    #[error("Failed to open serial port '{port}': {reason}")]
    LinkOpen { port: String, reason: String },

    #[error("Failed to send data: {0}")]
    LinkWrite(String),

    #[error("Failed to read from device: {0}")]
    LinkRead(String),

    #[error("Timed out after {0} ms waiting for the device")]
    LinkTimeout(u64),

    // === Step Data Errors ===
    #[error("Malformed step data: {0}")]
    MalformedStep(String),

    #[error("No lookup value defined for '{name}' or '{name}_alt'")]
    MissingLookupEntry { name: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Test File Errors ===
    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Invalid test file '{path}': {reason}")]
    TestFile { path: String, reason: String },

    #[error("No test files found. Please check your inputs")]
    NoTestFiles,

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a link open error for a port
    pub fn link_open(port: &str, reason: impl ToString) -> Self {
        Self::LinkOpen {
            port: port.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a file read error from an IO failure
    pub fn file_read(path: &std::path::Path, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create an invalid test file error
    pub fn test_file(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::TestFile {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error means the link can no longer be trusted for the
    /// rest of the current file
    pub fn is_link_fatal(&self) -> bool {
        matches!(self, Error::LinkWrite(_) | Error::LinkRead(_))
    }
}
