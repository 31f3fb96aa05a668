//! Error handling for the extraction capability.

use thiserror::Error;

/// Result type for fonoextract operations.
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors surfaced by the extraction capability.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// The extraction process could not be started at all
    /// (binary missing, permissions, ...).
    #[error("failed to spawn extraction process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The extraction process ran and exited with a nonzero status.
    /// Terminal for the corresponding registry row.
    #[error("extraction failed (exit code {code}): {stderr}")]
    Failed { code: i32, stderr: String },

    /// Resolve-only mode could not produce a direct media URL.
    #[error("direct URL resolution failed for '{content_id}': {reason}")]
    Resolve { content_id: String, reason: String },
}

impl ExtractError {
    /// Whether the error comes from the subprocess itself (as opposed to
    /// not being able to start it).
    pub fn is_process_failure(&self) -> bool {
        matches!(self, ExtractError::Failed { .. })
    }
}
