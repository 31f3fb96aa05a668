//! Polymorphic storage tier capability.
//!
//! Every backend exposes the same three operations so the range-serving
//! logic upstream is written once and reused across tiers.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

/// Handle on the bytes of an asset, as held by one tier.
#[derive(Debug, Clone)]
pub enum TierObject {
    /// Local file: range requests are served by seeking, with bounded
    /// memory.
    File { path: PathBuf, len: u64 },
    /// Whole object buffered in memory (durable tier). Accepted scaling
    /// limit for audio-sized payloads; not appropriate for video.
    Buffer(Bytes),
}

impl TierObject {
    /// Total size of the asset in bytes.
    pub fn len(&self) -> u64 {
        match self {
            TierObject::File { len, .. } => *len,
            TierObject::Buffer(bytes) => bytes.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One storage backend in the fallback chain.
#[async_trait]
pub trait StorageTier: Send + Sync {
    /// Tier name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Whether the tier currently holds bytes for `locator`.
    async fn exists(&self, locator: &str) -> Result<bool>;

    /// Opens the asset, or `None` when this tier does not hold it.
    async fn open(&self, locator: &str) -> Result<Option<TierObject>>;

    /// Stores the file at `source` under `locator`.
    async fn put(&self, locator: &str, source: &Path) -> Result<()>;
}

/// Rejects locators that could escape the tier namespace.
pub(crate) fn validate_locator(locator: &str) -> Result<()> {
    if locator.is_empty()
        || locator.contains('/')
        || locator.contains('\\')
        || locator.contains("..")
    {
        return Err(crate::StoreError::InvalidLocator(locator.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_locator() {
        assert!(validate_locator("dQw4w9WgXcQ_alice.mp3").is_ok());
        assert!(validate_locator("").is_err());
        assert!(validate_locator("../etc/passwd").is_err());
        assert!(validate_locator("a/b.mp3").is_err());
        assert!(validate_locator("a\\b.mp3").is_err());
    }
}
