//! Local disk tier.
//!
//! Fast path for recently acquired content: the extraction subprocess
//! writes directly into this directory, and range requests are served by
//! seeking into the file.

use crate::error::Result;
use crate::tier::{validate_locator, StorageTier, TierObject};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Disk-backed storage tier.
#[derive(Debug)]
pub struct LocalTier {
    dir: PathBuf,
}

impl LocalTier {
    /// Creates the tier rooted at `dir` (the directory is created if
    /// needed).
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Root directory of the tier.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute path for a locator inside the tier.
    pub fn file_path(&self, locator: &str) -> Result<PathBuf> {
        validate_locator(locator)?;
        Ok(self.dir.join(locator))
    }
}

#[async_trait]
impl StorageTier for LocalTier {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        let path = self.file_path(locator)?;
        Ok(tokio::fs::metadata(&path).await.is_ok())
    }

    async fn open(&self, locator: &str) -> Result<Option<TierObject>> {
        let path = self.file_path(locator)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(TierObject::File {
                path,
                len: meta.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, locator: &str, source: &Path) -> Result<()> {
        let dest = self.file_path(locator)?;
        if source != dest {
            tokio::fs::copy(source, &dest).await?;
        }
        Ok(())
    }
}
