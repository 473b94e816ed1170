//! Error types for the conformance harness
//!
//! These cover failures of the harness itself (launching the probe, reading
//! configuration, timeouts). Problems found in the probe's output are
//! reported as [`crate::validate::Violation`]s instead.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Probe Process Errors ===
    #[error("Failed to launch probe '{binary}': {reason}")]
    Launch { binary: String, reason: String },

    #[error("Probe did not finish within {0} seconds")]
    Timeout(u64),

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a launch error for the given probe binary
    pub fn launch(binary: impl AsRef<Path>, reason: impl ToString) -> Self {
        Self::Launch {
            binary: binary.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: impl AsRef<Path>, error: impl ToString) -> Self {
        Self::FileRead {
            path: path.as_ref().display().to_string(),
            error: error.to_string(),
        }
    }
}
