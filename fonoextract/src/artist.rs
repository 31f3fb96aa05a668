//! Artist-derivation heuristic.
//!
//! Deterministic, pure function of `{title, channel, explicit artist}`:
//!
//! 1. an explicit artist field supplied by the extraction tool wins;
//! 2. else a `" - "` separator in the title yields the leading part,
//!    stripped of bracketed annotations;
//! 3. else a leading name followed by `ft./feat./featuring` is used;
//! 4. else the channel name, after checking it against a curated list of
//!    aggregator/media channels (in which case the title is retried with
//!    looser separators) and stripping auto-generated suffixes
//!    (`" - Topic"`, `"VEVO"`, `" Official"`).

use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder applied when no artist can be derived.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Placeholder applied when the extraction tool supplied no title.
pub const UNTITLED: &str = "Untitled";

lazy_static! {
    static ref BRACKETS_RE: Regex = Regex::new(r"[\(\[\{][^\)\]\}]*[\)\]\}]").unwrap();
    static ref SPACES_RE: Regex = Regex::new(r"\s{2,}").unwrap();
    static ref FEAT_RE: Regex =
        Regex::new(r"(?i)^(.{2,}?)\s+(?:ft\.?|feat\.?|featuring)\s+").unwrap();
    static ref TOPIC_SUFFIX_RE: Regex = Regex::new(r"(?i)\s*-\s*topic\s*$").unwrap();
    static ref VEVO_SUFFIX_RE: Regex = Regex::new(r"(?i)\s*vevo\s*$").unwrap();
    static ref OFFICIAL_SUFFIX_RE: Regex = Regex::new(r"(?i)\s+official\s*$").unwrap();
    // Word patterns that betray an aggregator/media channel rather than an
    // artist channel ("Trap Nation", "xxx Records", "Lyrics xxx", ...)
    static ref AGGREGATOR_PATTERN_RE: Regex = Regex::new(
        r"(?i)\b(records|recordings|lyrics|nation|sounds|network|promotions?|premieres?|playlists?|charts|bootlegs?|tv)\b"
    )
    .unwrap();
}

// Curated aggregator channels that the word patterns alone would miss
const AGGREGATOR_NAMES: &[&str] = &[
    "mrsuicidesheep",
    "proximity",
    "majestic casual",
    "7clouds",
    "unique vibes",
    "cloudkid",
    "selected",
    "la belle musique",
    "eton messy",
];

/// Derives the display title, falling back to a placeholder.
pub fn derive_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(t) if !t.is_empty() => t.to_string(),
        _ => UNTITLED.to_string(),
    }
}

/// Derives a canonical artist string from the extracted metadata.
pub fn derive_artist(
    title: Option<&str>,
    channel: Option<&str>,
    explicit_artist: Option<&str>,
) -> String {
    if let Some(artist) = non_empty(explicit_artist) {
        return artist.to_string();
    }

    if let Some(title) = non_empty(title) {
        if let Some(artist) = artist_from_dash_split(title) {
            return artist;
        }
        if let Some(artist) = artist_from_feat_pattern(title) {
            return artist;
        }
    }

    if let Some(channel) = non_empty(channel) {
        if is_aggregator_channel(channel) {
            if let Some(artist) = title.and_then(artist_from_loose_split) {
                return artist;
            }
        }
        let cleaned = strip_channel_suffixes(channel);
        if !cleaned.is_empty() {
            return cleaned;
        }
    }

    UNKNOWN_ARTIST.to_string()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Removes bracketed annotations and collapses whitespace.
fn strip_brackets(s: &str) -> String {
    let stripped = BRACKETS_RE.replace_all(s, " ");
    SPACES_RE.replace_all(&stripped, " ").trim().to_string()
}

/// `"Artist - Song"` → `"Artist"`
fn artist_from_dash_split(title: &str) -> Option<String> {
    let (before, _) = title.split_once(" - ")?;
    let artist = strip_brackets(before);
    (!artist.is_empty()).then_some(artist)
}

/// `"Artist ft. Someone ..."` → `"Artist"`
fn artist_from_feat_pattern(title: &str) -> Option<String> {
    let caps = FEAT_RE.captures(title)?;
    let artist = strip_brackets(caps.get(1)?.as_str());
    (!artist.is_empty()).then_some(artist)
}

/// Retry with looser separators (`-`, `|`, `:`, `x`/`×`), used when the
/// channel is a known aggregator and the strict split found nothing.
fn artist_from_loose_split(title: &str) -> Option<String> {
    const SEPARATORS: &[&str] = &[" - ", "|", ":", " x ", " × ", "-"];

    for sep in SEPARATORS {
        if let Some((before, after)) = title.split_once(sep) {
            if after.trim().is_empty() {
                continue;
            }
            let artist = strip_brackets(before);
            if artist.len() >= 2 {
                return Some(artist);
            }
        }
    }
    None
}

/// Whether the channel looks like an aggregator/media channel rather than
/// an artist channel.
fn is_aggregator_channel(channel: &str) -> bool {
    let lowered = channel.trim().to_lowercase();
    AGGREGATOR_NAMES.contains(&lowered.as_str()) || AGGREGATOR_PATTERN_RE.is_match(channel)
}

/// Strips auto-generated channel suffixes (`" - Topic"`, `"VEVO"`,
/// `" Official"`).
fn strip_channel_suffixes(channel: &str) -> String {
    let cleaned = TOPIC_SUFFIX_RE.replace(channel, "");
    let cleaned = VEVO_SUFFIX_RE.replace(&cleaned, "");
    let cleaned = OFFICIAL_SUFFIX_RE.replace(&cleaned, "");
    cleaned.trim().to_string()
}
