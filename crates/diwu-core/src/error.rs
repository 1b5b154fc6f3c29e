//! Error types for diwu.
//!
//! Nothing in this crate is allowed to turn into a fatal exit. Build-time
//! errors end up as a log line and a degraded build; dispatch-time errors end
//! up as the `error` string of a reply payload.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for diwu.
#[derive(Debug, Error)]
pub enum DiwuError {
    // Transform errors
    #[error("Parse error in {module_id}: {message}")]
    Parse { module_id: String, message: String },

    // Artifact errors
    #[error("Bundling {module_id} failed: {message}")]
    BundleFailed { module_id: String, message: String },

    // Dispatch errors
    #[error("Script not found for hash {hash}")]
    ScriptNotFound { hash: String },

    #[error("Invalid arguments: {message}")]
    InvalidArgs { message: String },

    #[error("Failed to spawn worker {path}: {message}")]
    WorkerSpawn { path: PathBuf, message: String },

    #[error("Worker timed out after {0:?}")]
    WorkerTimeout(std::time::Duration),

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for diwu operations.
pub type Result<T> = std::result::Result<T, DiwuError>;

impl From<std::io::Error> for DiwuError {
    fn from(err: std::io::Error) -> Self {
        DiwuError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for DiwuError {
    fn from(err: serde_json::Error) -> Self {
        DiwuError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl DiwuError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        DiwuError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an IO error describing what was being done at `path`.
    pub fn io(action: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        DiwuError::Io {
            message: format!("{} {}: {}", action, path.display(), err),
            path: Some(path),
            source: Some(err),
        }
    }

    /// Whether the error was caused by the request rather than the server.
    ///
    /// The dev server maps these to a 400 status; every other error is still
    /// delivered as a 200 with an `error` payload.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DiwuError::InvalidArgs { .. })
    }
}

/// Attach path context to `std::io::Result` values.
pub trait IoResultExt<T> {
    fn with_path(self, action: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, action: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| DiwuError::io(action, path, e))
    }
}
