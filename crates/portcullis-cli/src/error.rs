//! Error types for the Portcullis CLI

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Profile directory not found
    #[error("Profile directory not found: {path}")]
    ProfileNotFound { path: PathBuf },

    /// Profile directory contains no control files
    #[error("No control files found under {path}")]
    NoControls { path: PathBuf },

    /// Failed to read a profile source file
    #[error("Failed to read {path}: {source}")]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Untranslatable-resource count exceeded the configured tolerance
    #[error("{count} untranslatable resource(s) exceed tolerance of {tolerance}")]
    ToleranceExceeded { count: usize, tolerance: usize },

    /// Fatal conversion error from the engine
    #[error(transparent)]
    Convert(#[from] portcullis::ConvertError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
