use thiserror::Error;

use crate::acquire::Diagnostic;

/// Why a strategy could not produce captions for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable {
    /// The video exists but has captions turned off.
    TranscriptsDisabled,
    /// Captions exist, but none in an accepted English variant.
    NotFound,
    /// Private, deleted, age-restricted or region-blocked.
    VideoUnavailable,
    /// Normalized text shorter than the acceptance minimum.
    TooShort(usize),
    Other(String),
}

impl std::fmt::Display for Unavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unavailable::TranscriptsDisabled => write!(f, "transcripts are disabled for this video"),
            Unavailable::NotFound => write!(f, "no English transcript found"),
            Unavailable::VideoUnavailable => write!(f, "video unavailable"),
            Unavailable::TooShort(chars) => write!(f, "transcript too short ({chars} characters)"),
            Unavailable::Other(msg) => write!(f, "{msg}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not extract a video ID from: {0}")]
    UrlUnrecognized(String),

    #[error("transcript unavailable: {0}")]
    TranscriptUnavailable(Unavailable),

    #[error("rate limited by {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("model authentication failed: {0}")]
    ModelAuth(String),

    #[error("unexpected response from model: {0}")]
    ModelUnexpectedResponse(String),

    #[error("model call failed: {0}")]
    ModelCallFailed(String),

    #[error("failed to fetch transcript for {}", .0.video_id)]
    AcquisitionExhausted(Diagnostic),

    #[error("no video loaded; process a video before asking questions")]
    NoTranscript,

    #[error("{tool}: {message}")]
    Tool { tool: &'static str, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn unavailable(reason: Unavailable) -> Self {
        Error::TranscriptUnavailable(reason)
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited(_))
    }

    /// Video-level restriction rather than a missing caption track.
    pub fn is_restricted(&self) -> bool {
        matches!(self, Error::TranscriptUnavailable(Unavailable::VideoUnavailable))
    }

    /// Explanation suitable for showing to the person at the keyboard.
    pub fn user_message(&self) -> String {
        match self {
            Error::UrlUnrecognized(_) => "Invalid YouTube URL. Please check the format and try again.".to_string(),
            Error::AcquisitionExhausted(diag) => diag.render(),
            Error::ModelAuth(msg) => format!(
                "API authentication issue: {msg}\n\nPlease check that GOOGLE_API_KEY is set in your .env file \
                 and that the key is valid and active."
            ),
            Error::RateLimited(source) => {
                format!("Rate limited by {source}. Please wait a few minutes and try again.")
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Error::MalformedPayload(e.to_string())
        } else {
            Error::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::MalformedPayload(format!("JSON: {e}"))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::MalformedPayload(format!("XML: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_display() {
        let e = Error::unavailable(Unavailable::TooShort(12));
        assert_eq!(e.to_string(), "transcript unavailable: transcript too short (12 characters)");
    }

    #[test]
    fn test_classification_helpers() {
        assert!(Error::RateLimited("YouTube".into()).is_rate_limited());
        assert!(!Error::Network("timeout".into()).is_rate_limited());
        assert!(Error::unavailable(Unavailable::VideoUnavailable).is_restricted());
        assert!(!Error::unavailable(Unavailable::NotFound).is_restricted());
    }

    #[test]
    fn test_user_message_hints() {
        assert!(Error::ModelAuth("API key not valid".into()).user_message().contains("GOOGLE_API_KEY"));
        assert!(Error::RateLimited("Gemini API".into()).user_message().contains("wait"));
        assert!(Error::UrlUnrecognized("x".into()).user_message().starts_with("Invalid YouTube URL"));
    }

    #[test]
    fn test_serde_error_is_malformed_payload() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(Error::from(err), Error::MalformedPayload(_)));
    }
}
