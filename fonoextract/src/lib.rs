//! # fonoextract - Extraction capability
//!
//! This crate wraps the external extraction tool behind the [`Extractor`]
//! trait so the rest of the pipeline never deals with subprocess details:
//!
//! - `extract`: download the audio of an externally hosted asset into a
//!   local file and return the structured metadata emitted by the tool.
//! - `resolve_direct_url`: resolve-only mode, producing a short-lived direct
//!   media URL without downloading anything.
//!
//! The concrete implementation, [`YtDlpExtractor`], supervises one OS
//! process per invocation with captured output and explicit exit-code
//! handling. It also hosts the pure helpers shared with the orchestrator:
//! content-id parsing and the artist-derivation heuristic ([`artist`]).

pub mod artist;
mod error;
mod ytdlp;

pub use error::{ExtractError, Result};
pub use ytdlp::YtDlpExtractor;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

/// Structured metadata emitted by the extraction tool on success.
#[derive(Debug, Clone, Default)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    /// Channel / uploader name, used as the artist fallback.
    pub channel: Option<String>,
    /// Explicit artist field when the tool supplies one.
    pub artist: Option<String>,
    pub thumbnail_url: Option<String>,
    pub duration_secs: Option<u64>,
}

/// Abstract extraction capability.
///
/// Any concrete extraction tool sits behind this boundary; the orchestrator
/// and the delivery service only ever see this trait.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Downloads the audio of `url` into `output` and returns the parsed
    /// metadata.
    ///
    /// A successful download with unparsable metadata returns `Ok(None)`:
    /// the audio bytes themselves are valid, so the caller applies
    /// placeholder metadata instead of failing the acquisition.
    async fn extract(&self, url: &str, output: &Path) -> Result<Option<ExtractedMetadata>>;

    /// Resolves a short-lived direct media URL for `content_id` without
    /// downloading anything.
    async fn resolve_direct_url(&self, content_id: &str) -> Result<String>;
}

lazy_static! {
    static ref BARE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
    static ref URL_ID_RE: Regex = Regex::new(
        r"(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|shorts/|embed/|live/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)"
    )
    .unwrap();
}

/// Extracts the stable content id out of a submitted URL.
///
/// Accepts the usual URL shapes (watch, short link, shorts, embed, live) as
/// well as a bare 11-character id. Returns `None` when no valid id pattern
/// is found, which the orchestrator maps to a validation error.
pub fn parse_content_id(input: &str) -> Option<String> {
    let input = input.trim();

    if BARE_ID_RE.is_match(input) {
        return Some(input.to_string());
    }

    URL_ID_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Whether `id` is a well-formed content id.
pub fn is_valid_content_id(id: &str) -> bool {
    BARE_ID_RE.is_match(id)
}

/// Canonical watch URL for a content id (used for re-acquisition).
pub fn watch_url(content_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", content_id)
}
