//! Low-level download of `json3` subtitle payloads.

use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::http::{self, HttpClient};
use crate::{Error, Result};

/// Exponential backoff applied only to HTTP 429 answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Wait before the given (zero-based) attempt: none for the first, then 4s, 8s, ...
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        (attempt > 0).then(|| self.base_delay * 2u32.pow(attempt))
    }
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(default)]
    segs: Vec<Json3Seg>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    utf8: Option<String>,
}

/// Join every `events[].segs[].utf8` fragment with spaces (not yet normalized).
pub fn parse_json3(body: &str) -> Result<String> {
    let doc: Json3 = serde_json::from_str(body)?;
    Ok(doc
        .events
        .iter()
        .flat_map(|e| e.segs.iter())
        .filter_map(|s| s.utf8.as_deref())
        .collect::<Vec<_>>()
        .join(" "))
}

/// Download a `json3` subtitle document and return its raw text.
///
/// HTTP 429 is retried with backoff; any other non-success status, a
/// transport error, or an unparseable body ends the download immediately.
pub async fn download_json3(client: &dyn HttpClient, url: &str, policy: RetryPolicy) -> Result<String> {
    for attempt in 0..policy.max_attempts {
        if let Some(delay) = policy.delay_before(attempt) {
            debug!(
                "Waiting {delay:?} before subtitle retry (attempt {}/{})",
                attempt + 1,
                policy.max_attempts
            );
            tokio::time::sleep(delay).await;
        }

        let resp = client.get(url, &http::subtitle_headers()).await?;

        if resp.is_rate_limited() {
            warn!(
                "Subtitle download rate limited (HTTP 429), attempt {}/{}",
                attempt + 1,
                policy.max_attempts
            );
            continue;
        }
        if !resp.is_success() {
            return Err(Error::Network(format!("subtitle download returned HTTP {}", resp.status)));
        }

        debug!("Downloaded subtitle payload ({} bytes)", resp.body.len());
        return parse_json3(&resp.body);
    }

    Err(Error::RateLimited(format!(
        "YouTube subtitle endpoint after {} attempts",
        policy.max_attempts
    )))
}
