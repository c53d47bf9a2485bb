use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::Result;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

pub const YOUTUBE_REFERER: &str = "https://www.youtube.com/";

pub type Headers = Vec<(&'static str, String)>;

/// Pick a user agent at random for the next request.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS.choose(&mut rand::rng()).copied().unwrap_or(USER_AGENTS[0])
}

/// Header set that makes a page request look like a desktop browser.
pub fn browser_headers() -> Headers {
    vec![
        ("User-Agent", random_user_agent().to_string()),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Referer", YOUTUBE_REFERER.to_string()),
        ("DNT", "1".to_string()),
    ]
}

/// Header set for fetching a subtitle payload.
pub fn subtitle_headers() -> Headers {
    vec![
        ("User-Agent", random_user_agent().to_string()),
        ("Accept", "application/json".to_string()),
        ("Accept-Language", "en-US,en;q=0.9".to_string()),
        ("Referer", YOUTUBE_REFERER.to_string()),
    ]
}

/// Randomized politeness delays between upstream requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub enabled: bool,
}

impl Pacing {
    pub fn enabled() -> Self {
        Pacing { enabled: true }
    }

    pub fn none() -> Self {
        Pacing { enabled: false }
    }

    /// Sleep for a random number of seconds within `secs`.
    pub async fn pause(&self, secs: RangeInclusive<f64>) {
        if !self.enabled {
            return;
        }
        let delay = Duration::from_secs_f64(rand::rng().random_range(secs));
        debug!("Pausing {delay:?} before next request");
        tokio::time::sleep(delay).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::enabled()
    }
}

/// Status and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Minimal HTTP surface the caption strategies need.
///
/// Transport failures (timeouts, connection errors) are errors; any status
/// code the server answers with is a successful `HttpResponse`.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: &[(&'static str, String)]) -> Result<HttpResponse>;

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse>;
}

#[async_trait]
impl HttpClient for reqwest::Client {
    async fn get(&self, url: &str, headers: &[(&'static str, String)]) -> Result<HttpResponse> {
        let mut req = reqwest::Client::get(self, url);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!("GET {url} -> {status} ({} bytes)", body.len());
        Ok(HttpResponse { status, body })
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &serde_json::Value,
    ) -> Result<HttpResponse> {
        let mut req = self.post(url).json(body);
        for (name, value) in headers {
            req = req.header(*name, value);
        }
        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let body = resp.text().await?;
        debug!("POST {url} -> {status} ({} bytes)", body.len());
        Ok(HttpResponse { status, body })
    }
}

/// Build the shared reqwest client with a per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_user_agent_is_known() {
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&random_user_agent()));
        }
    }

    #[test]
    fn test_browser_headers_spoof_referer() {
        let headers = browser_headers();
        assert!(headers.iter().any(|(k, v)| *k == "Referer" && v == YOUTUBE_REFERER));
        assert!(headers.iter().any(|(k, _)| *k == "User-Agent"));
    }

    #[test]
    fn test_response_status_helpers() {
        let ok = HttpResponse { status: 200, body: String::new() };
        let limited = HttpResponse { status: 429, body: String::new() };
        assert!(ok.is_success() && !ok.is_rate_limited());
        assert!(!limited.is_success() && limited.is_rate_limited());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_none_does_not_sleep() {
        let start = tokio::time::Instant::now();
        Pacing::none().pause(1.0..=3.0).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_sleeps_within_range() {
        let start = tokio::time::Instant::now();
        Pacing::enabled().pause(1.0..=3.0).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed <= Duration::from_millis(3001));
    }
}
