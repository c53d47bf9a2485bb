pub mod acquire;
pub mod config;
pub mod error;
pub mod gemini;
pub mod http;
pub mod normalize;
pub mod session;
pub mod subtitle;
pub mod summarize;
pub mod web;
pub mod youtube;
pub mod ytdlp;

#[cfg(test)]
mod testing;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

pub use error::{Error, Result, Unavailable};

/// Identifier of a hosted video, as captured from its URL
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VideoId(String);

impl VideoId {
    /// Parse a video ID out of a YouTube URL.
    pub fn parse(url: &str) -> Result<Self> {
        extract_video_id(url).ok_or_else(|| Error::UrlUnrecognized(url.trim().to_string()))
    }

    /// Accept either a URL or a bare ID token (diagnostic entry points only).
    pub fn parse_lenient(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Some(id) = extract_video_id(input) {
            return Ok(id);
        }
        if BARE_ID.is_match(input) {
            return Ok(VideoId(input.to_string()));
        }
        Err(Error::UrlUnrecognized(input.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }

    pub fn embed_url(&self) -> String {
        format!("https://www.youtube.com/embed/{}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized caption text for one video.
///
/// Only constructed through [`Transcript::accept`], so every value has
/// passed the minimum-length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(String);

impl Transcript {
    /// Normalize raw caption text and accept it if long enough.
    pub fn accept(raw: &str) -> Result<Self> {
        let text = normalize::normalize(raw);
        let chars = text.chars().count();
        if chars < normalize::MIN_TRANSCRIPT_CHARS {
            return Err(Error::unavailable(Unavailable::TooShort(chars)));
        }
        Ok(Transcript(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }
}

impl std::fmt::Display for Transcript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/|youtube\.com/live/)([^&\n?#/]+)",
        r"youtube\.com/watch\?(?:[^#\n]*&)?v=([^&\n?#]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    let input = input.trim();
    URL_PATTERNS
        .iter()
        .find_map(|re| re.captures(input))
        .map(|caps| VideoId(caps[1].to_string()))
}
