//! yt-dlp backed implementation of the [`Extractor`] trait.
//!
//! Each invocation supervises one OS process with captured stdout/stderr.
//! Metadata is read from the single-line JSON dump the tool prints after a
//! successful download (`--print-json`).

use crate::error::{ExtractError, Result};
use crate::{watch_url, ExtractedMetadata, Extractor};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, warn};

/// Subset of the info JSON emitted by the extraction tool.
#[derive(Debug, Deserialize)]
struct InfoJson {
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    artist: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
}

impl From<InfoJson> for ExtractedMetadata {
    fn from(info: InfoJson) -> Self {
        ExtractedMetadata {
            title: info.title,
            channel: info.channel.or(info.uploader),
            artist: info.artist,
            thumbnail_url: info.thumbnail,
            duration_secs: info.duration.map(|d| d.max(0.0) as u64),
        }
    }
}

/// Extractor backed by the `yt-dlp` command-line tool.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    binary: String,
}

impl YtDlpExtractor {
    /// Creates an extractor using the given binary (name in `PATH` or
    /// absolute path).
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn stderr_excerpt(output: &Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Keep the tail: the tool prints the actual error last
        let excerpt: String = stderr.trim().chars().rev().take(500).collect();
        excerpt.chars().rev().collect()
    }

    fn check_status(output: &Output) -> Result<()> {
        if output.status.success() {
            return Ok(());
        }
        Err(ExtractError::Failed {
            code: output.status.code().unwrap_or(-1),
            stderr: Self::stderr_excerpt(output),
        })
    }

    /// Parses the last JSON line of stdout, if any.
    fn parse_info_json(stdout: &[u8]) -> Option<ExtractedMetadata> {
        let text = String::from_utf8_lossy(stdout);
        let json_line = text
            .lines()
            .rev()
            .find(|line| line.trim_start().starts_with('{'))?;

        match serde_json::from_str::<InfoJson>(json_line) {
            Ok(info) => Some(info.into()),
            Err(e) => {
                warn!("Cannot parse extraction metadata JSON: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    async fn extract(&self, url: &str, output: &Path) -> Result<Option<ExtractedMetadata>> {
        // yt-dlp substitutes the final extension after audio extraction,
        // so the output template uses %(ext)s with the requested stem
        let template = output.with_extension("%(ext)s");

        debug!(url = %url, output = %output.display(), "Spawning extraction process");

        let result = Command::new(&self.binary)
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--no-playlist")
            .arg("--print-json")
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-x")
            .arg("--audio-format")
            .arg("mp3")
            .arg("-o")
            .arg(&template)
            .arg(url)
            .output()
            .await
            .map_err(ExtractError::Spawn)?;

        Self::check_status(&result)?;

        Ok(Self::parse_info_json(&result.stdout))
    }

    async fn resolve_direct_url(&self, content_id: &str) -> Result<String> {
        let url = watch_url(content_id);

        let result = Command::new(&self.binary)
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("-f")
            .arg("bestaudio/best")
            .arg("-g")
            .arg(&url)
            .output()
            .await
            .map_err(ExtractError::Spawn)?;

        if !result.status.success() {
            return Err(ExtractError::Resolve {
                content_id: content_id.to_string(),
                reason: Self::stderr_excerpt(&result),
            });
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ExtractError::Resolve {
                content_id: content_id.to_string(),
                reason: "empty resolver output".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info_json_picks_last_json_line() {
        let stdout = b"some progress noise\n{\"title\":\"Song\",\"channel\":\"Chan\",\"duration\":12.7}\n";
        let meta = YtDlpExtractor::parse_info_json(stdout).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Song"));
        assert_eq!(meta.channel.as_deref(), Some("Chan"));
        assert_eq!(meta.duration_secs, Some(12));
    }

    #[test]
    fn test_parse_info_json_uploader_fallback() {
        let stdout = b"{\"title\":\"Song\",\"uploader\":\"Uploader\"}";
        let meta = YtDlpExtractor::parse_info_json(stdout).unwrap();
        assert_eq!(meta.channel.as_deref(), Some("Uploader"));
    }

    #[test]
    fn test_parse_info_json_tolerates_garbage() {
        assert!(YtDlpExtractor::parse_info_json(b"no json here").is_none());
        assert!(YtDlpExtractor::parse_info_json(b"{not valid json").is_none());
    }

    #[tokio::test]
    async fn test_spawn_failure_on_missing_binary() {
        let extractor = YtDlpExtractor::new("/nonexistent/fonobox-test-binary");
        let dir = tempfile::tempdir().unwrap();
        let err = extractor
            .extract("https://youtu.be/dQw4w9WgXcQ", &dir.path().join("out.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Spawn(_)));
    }
}
