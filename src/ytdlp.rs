use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use crate::acquire::Strategy;
use crate::http::{self, HttpClient, Pacing};
use crate::subtitle::{self, RetryPolicy};
use crate::{Error, Result, Transcript, Unavailable, VideoId};

/// Subtitle languages in order of preference.
pub const PREFERRED_LANGS: [&str; 3] = ["en", "en-US", "en-GB"];

const SUBTITLE_FORMAT: &str = "json3";

/// The slice of yt-dlp's info JSON this strategy reads.
#[derive(Debug, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitles: HashMap<String, Vec<SubtitleFormat>>,
    #[serde(default)]
    pub automatic_captions: HashMap<String, Vec<SubtitleFormat>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleFormat {
    pub ext: Option<String>,
    pub url: Option<String>,
}

/// Whether a track was uploaded by the author or generated by speech recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleKind {
    Manual,
    Automatic,
}

impl std::fmt::Display for SubtitleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleKind::Manual => write!(f, "manual"),
            SubtitleKind::Automatic => write!(f, "auto-generated"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleChoice {
    pub kind: SubtitleKind,
    pub lang: &'static str,
    pub url: String,
}

/// Pick the `json3` track to download: manual before automatic, then by language preference.
pub fn select_subtitle(info: &VideoInfo) -> Option<SubtitleChoice> {
    let sources = [
        (SubtitleKind::Manual, &info.subtitles),
        (SubtitleKind::Automatic, &info.automatic_captions),
    ];
    for (kind, tracks) in sources {
        for lang in PREFERRED_LANGS {
            let url = tracks
                .get(lang)
                .into_iter()
                .flatten()
                .find(|f| f.ext.as_deref() == Some(SUBTITLE_FORMAT))
                .and_then(|f| f.url.clone());
            if let Some(url) = url {
                return Some(SubtitleChoice { kind, lang, url });
            }
        }
    }
    None
}

/// Source of video metadata including the subtitle track listing.
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    async fn extract_info(&self, video_id: &VideoId) -> Result<VideoInfo>;
}

/// Runs the `yt-dlp` binary in metadata-only mode.
pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        YtDlp {
            program: program.into(),
        }
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        YtDlp::new("yt-dlp")
    }
}

#[async_trait]
impl InfoExtractor for YtDlp {
    async fn extract_info(&self, video_id: &VideoId) -> Result<VideoInfo> {
        // yt-dlp may leave fragments behind even with --skip-download
        let scratch = tempfile::tempdir()?;
        let url = video_id.watch_url();
        let sub_langs = PREFERRED_LANGS.join(",");
        debug!("Running {} for {url}", self.program.display());

        let output = tokio::process::Command::new(&self.program)
            .current_dir(scratch.path())
            .args([
                "--dump-single-json",
                "--skip-download",
                "--no-playlist",
                "--no-warnings",
                "--sub-format",
                SUBTITLE_FORMAT,
                "--sub-langs",
                sub_langs.as_str(),
                "--user-agent",
                http::random_user_agent(),
                "--add-header",
                "Accept-Language:en-US,en;q=0.9",
                url.as_str(),
            ])
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(o) => o,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Tool {
                    tool: "yt-dlp",
                    message: "not found. Install it with `pip install yt-dlp` or `brew install yt-dlp`".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&stderr));
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Map yt-dlp's error output onto the error taxonomy.
fn classify_failure(stderr: &str) -> Error {
    let lower = stderr.to_lowercase();
    if lower.contains("429") || lower.contains("too many requests") {
        return Error::RateLimited("YouTube (yt-dlp)".to_string());
    }
    let restricted = [
        "private video",
        "sign in",
        "video unavailable",
        "has been removed",
        "not available in your country",
        "members-only",
    ];
    if restricted.iter().any(|needle| lower.contains(needle)) {
        return Error::unavailable(Unavailable::VideoUnavailable);
    }
    let last_line = stderr.trim().lines().last().unwrap_or("").to_string();
    Error::Tool {
        tool: "yt-dlp",
        message: last_line,
    }
}

/// Metadata extraction with yt-dlp, then a direct download of the chosen subtitle track.
pub struct YtDlpStrategy {
    extractor: Box<dyn InfoExtractor>,
    http: Arc<dyn HttpClient>,
    retry: RetryPolicy,
    pacing: Pacing,
}

impl YtDlpStrategy {
    pub fn new(extractor: Box<dyn InfoExtractor>, http: Arc<dyn HttpClient>, retry: RetryPolicy, pacing: Pacing) -> Self {
        YtDlpStrategy {
            extractor,
            http,
            retry,
            pacing,
        }
    }
}

#[async_trait]
impl Strategy for YtDlpStrategy {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn attempt(&self, video_id: &VideoId) -> Result<Transcript> {
        self.pacing.pause(1.0..=2.0).await;
        let info = self.extractor.extract_info(video_id).await?;

        let choice = select_subtitle(&info).ok_or(Error::unavailable(Unavailable::NotFound))?;
        info!("Found {} subtitles ({}) for {video_id}", choice.kind, choice.lang);

        self.pacing.pause(1.0..=2.0).await;
        let raw = subtitle::download_json3(self.http.as_ref(), &choice.url, self.retry).await?;
        Transcript::accept(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedHttp;

    fn fmt(ext: &str, url: &str) -> SubtitleFormat {
        SubtitleFormat {
            ext: Some(ext.to_string()),
            url: Some(url.to_string()),
        }
    }

    fn tracks(entries: &[(&str, Vec<SubtitleFormat>)]) -> HashMap<String, Vec<SubtitleFormat>> {
        entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    struct FixedInfo(fn() -> Result<VideoInfo>);

    #[async_trait]
    impl InfoExtractor for FixedInfo {
        async fn extract_info(&self, _video_id: &VideoId) -> Result<VideoInfo> {
            (self.0)()
        }
    }

    fn sample_info() -> Result<VideoInfo> {
        Ok(VideoInfo {
            title: Some("Sample".to_string()),
            subtitles: tracks(&[("en", vec![fmt("json3", "https://subs.test/manual")])]),
            automatic_captions: HashMap::new(),
        })
    }

    #[test]
    fn test_manual_preferred_over_automatic() {
        let info = VideoInfo {
            title: None,
            subtitles: tracks(&[("en", vec![fmt("vtt", "https://x/vtt"), fmt("json3", "https://x/manual")])]),
            automatic_captions: tracks(&[("en", vec![fmt("json3", "https://x/auto")])]),
        };
        let choice = select_subtitle(&info).unwrap();
        assert_eq!(choice.kind, SubtitleKind::Manual);
        assert_eq!(choice.url, "https://x/manual");
    }

    #[test]
    fn test_language_preference_order() {
        let info = VideoInfo {
            title: None,
            subtitles: tracks(&[
                ("en-GB", vec![fmt("json3", "https://x/gb")]),
                ("en-US", vec![fmt("json3", "https://x/us")]),
            ]),
            automatic_captions: HashMap::new(),
        };
        let choice = select_subtitle(&info).unwrap();
        assert_eq!(choice.lang, "en-US");
    }

    #[test]
    fn test_falls_back_to_automatic() {
        let info = VideoInfo {
            title: None,
            subtitles: tracks(&[("de", vec![fmt("json3", "https://x/de")])]),
            automatic_captions: tracks(&[("en", vec![fmt("json3", "https://x/auto")])]),
        };
        let choice = select_subtitle(&info).unwrap();
        assert_eq!(choice.kind, SubtitleKind::Automatic);
        assert_eq!(choice.url, "https://x/auto");
    }

    #[test]
    fn test_manual_without_json3_falls_through() {
        let info = VideoInfo {
            title: None,
            subtitles: tracks(&[("en", vec![fmt("srv3", "https://x/srv3")])]),
            automatic_captions: tracks(&[("en", vec![fmt("json3", "https://x/auto")])]),
        };
        assert_eq!(select_subtitle(&info).unwrap().kind, SubtitleKind::Automatic);
    }

    #[test]
    fn test_no_english_tracks() {
        let info = VideoInfo {
            title: None,
            subtitles: tracks(&[("fr", vec![fmt("json3", "https://x/fr")])]),
            automatic_captions: HashMap::new(),
        };
        assert!(select_subtitle(&info).is_none());
    }

    #[test]
    fn test_parse_info_json() {
        let json = r#"{
            "id": "abc",
            "title": "A talk",
            "subtitles": {"en": [{"ext": "json3", "url": "https://x/1", "name": "English"}]},
            "automatic_captions": {}
        }"#;
        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.title.as_deref(), Some("A talk"));
        assert_eq!(select_subtitle(&info).unwrap().url, "https://x/1");
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure("ERROR: HTTP Error 429: Too Many Requests").is_rate_limited());
        assert!(classify_failure("ERROR: [youtube] abc: Private video. Sign in if you've been granted access").is_restricted());
        assert!(matches!(
            classify_failure("WARNING: x\nERROR: something odd"),
            Error::Tool { message, .. } if message == "ERROR: something odd"
        ));
    }

    #[tokio::test]
    async fn test_strategy_downloads_selected_track() {
        let body = r#"{"events":[{"segs":[{"utf8":"This transcript is long enough to be accepted by the\nnormalizer check."}]}]}"#;
        let http = Arc::new(ScriptedHttp::new().respond(200, body));
        let strategy = YtDlpStrategy::new(
            Box::new(FixedInfo(sample_info)),
            http.clone(),
            RetryPolicy::default(),
            Pacing::none(),
        );

        let id = VideoId::parse("https://youtu.be/abc").unwrap();
        let transcript = strategy.attempt(&id).await.unwrap();
        assert!(!transcript.as_str().contains('\n'));
        assert_eq!(http.urls(), vec!["https://subs.test/manual".to_string()]);
    }

    #[tokio::test]
    async fn test_strategy_rejects_short_transcript() {
        let http = Arc::new(ScriptedHttp::new().respond(200, r#"{"events":[{"segs":[{"utf8":"too short"}]}]}"#));
        let strategy = YtDlpStrategy::new(Box::new(FixedInfo(sample_info)), http, RetryPolicy::default(), Pacing::none());
        let id = VideoId::parse("https://youtu.be/abc").unwrap();
        assert!(matches!(
            strategy.attempt(&id).await,
            Err(Error::TranscriptUnavailable(Unavailable::TooShort(9)))
        ));
    }

    #[tokio::test]
    async fn test_strategy_without_tracks_makes_no_request() {
        let http = Arc::new(ScriptedHttp::new());
        let strategy = YtDlpStrategy::new(
            Box::new(FixedInfo(|| Ok(VideoInfo::default()))),
            http.clone(),
            RetryPolicy::default(),
            Pacing::none(),
        );
        let id = VideoId::parse("https://youtu.be/abc").unwrap();
        assert!(matches!(
            strategy.attempt(&id).await,
            Err(Error::TranscriptUnavailable(Unavailable::NotFound))
        ));
        assert_eq!(http.call_count(), 0);
    }
}
