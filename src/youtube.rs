use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;

use crate::acquire::Strategy;
use crate::http::{self, HttpClient, HttpResponse, Pacing};
use crate::{Error, Result, Transcript, Unavailable, VideoId};

const INNERTUBE_CLIENT_VERSION: &str = "2.20241126.01.00";

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    #[serde(rename = "playabilityStatus")]
    playability_status: Option<PlayabilityStatus>,
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode", default)]
    pub language_code: String,
    /// `"asr"` for speech-recognition tracks, absent for uploaded ones
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Turn a non-success answer into the matching error.
fn check_status(resp: &HttpResponse, what: &str) -> Result<()> {
    if resp.is_rate_limited() {
        return Err(Error::RateLimited(format!("YouTube ({what})")));
    }
    if !resp.is_success() {
        return Err(Error::Network(format!("{what} returned HTTP {}", resp.status)));
    }
    Ok(())
}

fn extract_api_key(html: &str) -> Result<String> {
    static PRIMARY: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap());
    static FALLBACK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#).unwrap());

    PRIMARY
        .captures(html)
        .or_else(|| FALLBACK.captures(html))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| Error::MalformedPayload("could not extract InnerTube API key from watch page".to_string()))
}

/// Exact-language track, uploaded captions before generated ones.
fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .find(|t| t.language_code == lang && !t.is_generated())
        .or_else(|| tracks.iter().find(|t| t.language_code == lang))
}

/// Locate the `"captionTracks"` array embedded in a watch page and parse it.
///
/// Returns `Ok(None)` when the page carries no caption listing at all.
pub fn extract_caption_tracks(html: &str) -> Result<Option<Vec<CaptionTrack>>> {
    static CAPTION_TRACKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""captionTracks"\s*:\s*\["#).unwrap());

    let Some(m) = CAPTION_TRACKS.find(html) else {
        return Ok(None);
    };
    let array = balanced_array(&html[m.end() - 1..])
        .ok_or_else(|| Error::MalformedPayload("unterminated captionTracks array".to_string()))?;
    Ok(Some(serde_json::from_str(array)?))
}

/// Slice of `s` (which starts at `[`) up to its matching `]`, skipping brackets inside strings.
fn balanced_array(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in s.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' => depth += 1,
            b']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Collect the text content of every `<text>` element in a timedtext XML document.
pub fn parse_caption_xml(xml: &str) -> Result<Vec<String>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut parts = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"text" => {
                current = Some(String::new());
            }
            Ok(Event::Text(ref e)) => {
                if let Some(buf) = current.as_mut() {
                    let raw_text = e.unescape().unwrap_or_default().to_string();
                    // Caption payloads are frequently double-escaped
                    buf.push_str(&html_escape::decode_html_entities(&raw_text));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"text" => {
                if let Some(text) = current.take().filter(|t| !t.is_empty()) {
                    parts.push(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
    }

    Ok(parts)
}

/// Fetch an XML caption track and accept its joined text.
async fn fetch_xml_transcript(
    client: &dyn HttpClient,
    url: &str,
    headers: &[(&'static str, String)],
) -> Result<Transcript> {
    let resp = client.get(url, headers).await?;
    check_status(&resp, "caption download")?;
    let parts = parse_caption_xml(&resp.body)?;
    debug!("Parsed {} caption lines", parts.len());
    Transcript::accept(&parts.join(" "))
}

/// Captioning-library route: InnerTube player API, English track only.
pub struct InnerTubeStrategy {
    http: Arc<dyn HttpClient>,
    pacing: Pacing,
}

impl InnerTubeStrategy {
    pub fn new(http: Arc<dyn HttpClient>, pacing: Pacing) -> Self {
        InnerTubeStrategy { http, pacing }
    }
}

#[async_trait]
impl Strategy for InnerTubeStrategy {
    fn name(&self) -> &'static str {
        "innertube"
    }

    async fn attempt(&self, video_id: &VideoId) -> Result<Transcript> {
        self.pacing.pause(1.0..=3.0).await;
        let headers = http::browser_headers();

        // Step 1: the watch page carries the InnerTube API key
        let watch_url = video_id.watch_url();
        debug!("Fetching watch page: {watch_url}");
        let page = self.http.get(&watch_url, &headers).await?;
        check_status(&page, "watch page")?;
        let api_key = extract_api_key(&page.body)?;

        // Step 2: player endpoint lists the caption tracks
        let player_url = format!("https://www.youtube.com/youtubei/v1/player?key={api_key}&prettyPrint=false");
        let body = serde_json::json!({
            "context": {
                "client": {
                    "hl": "en",
                    "gl": "US",
                    "clientName": "WEB",
                    "clientVersion": INNERTUBE_CLIENT_VERSION
                }
            },
            "videoId": video_id.as_str()
        });
        let player = self.http.post_json(&player_url, &headers, &body).await?;
        check_status(&player, "InnerTube player")?;
        let resp: InnerTubePlayerResponse = serde_json::from_str(&player.body)?;

        if let Some(status) = &resp.playability_status {
            let code = status.status.as_deref().unwrap_or("OK");
            if code != "OK" {
                warn!(
                    "Video {video_id} not playable ({code}): {}",
                    status.reason.as_deref().unwrap_or("no reason given")
                );
                return Err(Error::unavailable(Unavailable::VideoUnavailable));
            }
        }

        let tracks = resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default();
        if tracks.is_empty() {
            return Err(Error::unavailable(Unavailable::TranscriptsDisabled));
        }

        let track = select_track(&tracks, "en").ok_or(Error::unavailable(Unavailable::NotFound))?;
        info!(
            "Using {} InnerTube track for {video_id}",
            if track.is_generated() { "generated" } else { "uploaded" }
        );

        // Step 3: the caption XML itself
        fetch_xml_transcript(self.http.as_ref(), &track.base_url, &headers).await
    }
}

/// Scrape the caption listing straight out of the public watch page.
pub struct PageScrapeStrategy {
    http: Arc<dyn HttpClient>,
    pacing: Pacing,
}

impl PageScrapeStrategy {
    pub fn new(http: Arc<dyn HttpClient>, pacing: Pacing) -> Self {
        PageScrapeStrategy { http, pacing }
    }
}

#[async_trait]
impl Strategy for PageScrapeStrategy {
    fn name(&self) -> &'static str {
        "page"
    }

    async fn attempt(&self, video_id: &VideoId) -> Result<Transcript> {
        self.pacing.pause(2.0..=4.0).await;
        let headers = http::browser_headers();

        let page = self.http.get(&video_id.watch_url(), &headers).await?;
        check_status(&page, "watch page")?;

        let tracks = extract_caption_tracks(&page.body)?
            .ok_or(Error::unavailable(Unavailable::TranscriptsDisabled))?;
        let track = tracks
            .iter()
            .find(|t| t.language_code.starts_with("en"))
            .ok_or(Error::unavailable(Unavailable::NotFound))?;
        debug!("Scraped caption track {} for {video_id}", track.language_code);

        self.pacing.pause(1.0..=2.0).await;
        fetch_xml_transcript(self.http.as_ref(), &track.base_url, &headers).await
    }
}
