//! Versioning error types.

use thiserror::Error;

/// Result type for versioning operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while recording, listing, restoring or pruning versions.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A version was queried for a path that was never snapshotted.
    #[error("no snapshot information for '{0}'")]
    NoSnapshotInfo(String),

    /// The snapshot tool refused a second backup inside its minimum interval.
    #[error("snapshot attempted too soon after the previous one: {0}")]
    TooSoon(String),

    /// The snapshot tool reported an unexpected failure.
    #[error("rdiff-backup {command} failed: {stderr}")]
    Tool { command: String, stderr: String },

    /// Bounded retry on close gave up.
    #[error("snapshot of '{path}' not taken after {attempts} attempts: {last}")]
    RetriesExhausted {
        path: String,
        attempts: u32,
        last: String,
    },

    /// Requested version is outside the stored range.
    #[error("version {version} of '{path}' not found")]
    VersionNotFound { path: String, version: u64 },

    /// Prune boundary is malformed or out of range.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// A restore or prune subprocess failed, or the target is the wrong kind.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// File not found in the user namespace.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Path is malformed, escapes the root, or points into hidden storage.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SnapshotError {
    /// Create a missing snapshot info error.
    pub fn no_snapshot_info(path: impl Into<String>) -> Self {
        Self::NoSnapshotInfo(path.into())
    }

    /// Create a tool failure error.
    pub fn tool(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Tool {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a version not found error.
    pub fn version_not_found(path: impl Into<String>, version: u64) -> Self {
        Self::VersionNotFound {
            path: path.into(),
            version,
        }
    }

    /// Create an invalid version error.
    pub fn invalid_version(message: impl Into<String>) -> Self {
        Self::InvalidVersion(message.into())
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed(message.into())
    }

    /// Create a file not found error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Create an invalid path error.
    pub fn invalid_path(message: impl Into<String>) -> Self {
        Self::InvalidPath(message.into())
    }

    /// Check if this error means the path has no history yet.
    pub fn is_no_snapshot_info(&self) -> bool {
        matches!(self, Self::NoSnapshotInfo(_))
    }

    /// Check if this error is the tool's minimum-interval refusal.
    pub fn is_too_soon(&self) -> bool {
        matches!(self, Self::TooSoon(_))
    }

    /// Check if this error is an out-of-range version.
    pub fn is_version_not_found(&self) -> bool {
        matches!(self, Self::VersionNotFound { .. })
    }

    /// Check if this error is a rejected prune boundary.
    pub fn is_invalid_version(&self) -> bool {
        matches!(self, Self::InvalidVersion(_))
    }
}
