//! Error handling for the storage tiers.

use thiserror::Error;

/// Result type for fonostore operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the storage tiering resolver.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Locator contains path separators or traversal sequences.
    #[error("invalid locator '{0}'")]
    InvalidLocator(String),

    /// Durable tier (object store) request failed.
    #[error("durable tier error: {0}")]
    Durable(String),

    /// An operation requiring the durable tier ran without one configured.
    #[error("durable tier is not configured")]
    DurableDisabled,

    /// Registry access failed during a maintenance operation.
    #[error("registry error: {0}")]
    Registry(String),
}
