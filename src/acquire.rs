//! Ordered fallback over independent caption strategies.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::http::{HttpClient, Pacing};
use crate::subtitle::RetryPolicy;
use crate::youtube::{InnerTubeStrategy, PageScrapeStrategy};
use crate::ytdlp::{YtDlp, YtDlpStrategy};
use crate::{Error, Result, Transcript, VideoId};

/// Pause between one strategy failing and the next starting.
pub const STRATEGY_GAP: Duration = Duration::from_secs(2);

/// One self-contained way of obtaining captions for a video.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, video_id: &VideoId) -> Result<Transcript>;
}

/// Strategies selectable from config and the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// yt-dlp metadata plus json3 subtitle download
    #[value(name = "yt-dlp")]
    #[serde(rename = "yt-dlp")]
    YtDlp,
    /// Caption listing scraped from the watch page
    Page,
    /// InnerTube player API
    #[value(name = "innertube")]
    #[serde(rename = "innertube")]
    InnerTube,
}

impl StrategyKind {
    pub fn default_chain() -> Vec<StrategyKind> {
        vec![StrategyKind::YtDlp, StrategyKind::Page]
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::YtDlp => write!(f, "yt-dlp"),
            StrategyKind::Page => write!(f, "page"),
            StrategyKind::InnerTube => write!(f, "innertube"),
        }
    }
}

/// Everything needed to build the concrete strategies.
pub struct StrategyDeps {
    pub http: Arc<dyn HttpClient>,
    pub ytdlp_path: PathBuf,
    pub retry: RetryPolicy,
    pub pacing: Pacing,
}

impl StrategyDeps {
    pub fn build(&self, kind: StrategyKind) -> Box<dyn Strategy> {
        match kind {
            StrategyKind::YtDlp => Box::new(YtDlpStrategy::new(
                Box::new(YtDlp::new(self.ytdlp_path.clone())),
                self.http.clone(),
                self.retry,
                self.pacing,
            )),
            StrategyKind::Page => Box::new(PageScrapeStrategy::new(self.http.clone(), self.pacing)),
            StrategyKind::InnerTube => Box::new(InnerTubeStrategy::new(self.http.clone(), self.pacing)),
        }
    }
}

/// A single failed strategy attempt.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub strategy: &'static str,
    pub error: String,
    pub rate_limited: bool,
    pub restricted: bool,
}

/// Likely explanations offered when every strategy failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    NoCaptions,
    RateLimited,
    Restricted,
}

impl Cause {
    pub fn title(&self) -> &'static str {
        match self {
            Cause::NoCaptions => "No captions available",
            Cause::RateLimited => "Rate limited",
            Cause::Restricted => "Video restrictions",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Cause::NoCaptions => {
                "Check the CC button on YouTube; not every video has subtitles enabled."
            }
            Cause::RateLimited => {
                "YouTube throttles repeated requests. Wait 15-30 minutes and try again, or switch networks."
            }
            Cause::Restricted => {
                "The video may be private, age-restricted, region-locked or deleted."
            }
        }
    }
}

/// What happened on each strategy, for presenting an exhausted acquisition.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub video_id: VideoId,
    pub attempts: Vec<Attempt>,
}

impl Diagnostic {
    /// All causes, the ones actually observed first.
    pub fn likely_causes(&self) -> Vec<Cause> {
        let rate_limited = self.attempts.iter().any(|a| a.rate_limited);
        let restricted = self.attempts.iter().any(|a| a.restricted);

        let mut causes = Vec::with_capacity(3);
        if rate_limited {
            causes.push(Cause::RateLimited);
        }
        if restricted {
            causes.push(Cause::Restricted);
        }
        for cause in [Cause::NoCaptions, Cause::RateLimited, Cause::Restricted] {
            if !causes.contains(&cause) {
                causes.push(cause);
            }
        }
        causes
    }

    pub fn render(&self) -> String {
        let mut out = format!("Failed to fetch transcript for {}\n", self.video_id);
        for attempt in &self.attempts {
            out.push_str(&format!("  - {}: {}\n", attempt.strategy, attempt.error));
        }
        out.push_str("\nPossible issues:\n");
        for (i, cause) in self.likely_causes().iter().enumerate() {
            out.push_str(&format!("  {}. {}: {}\n", i + 1, cause.title(), cause.hint()));
        }
        out.push_str("\nTry again later, or try a different video with confirmed captions.");
        out
    }
}

/// Runs strategies in order until one yields an accepted transcript.
pub struct Acquirer {
    strategies: Vec<Box<dyn Strategy>>,
    gap: Duration,
}

impl Acquirer {
    pub fn new(strategies: Vec<Box<dyn Strategy>>, gap: Duration) -> Self {
        Acquirer { strategies, gap }
    }

    pub fn from_kinds(kinds: &[StrategyKind], deps: &StrategyDeps) -> Self {
        let gap = if deps.pacing.enabled { STRATEGY_GAP } else { Duration::ZERO };
        Acquirer::new(kinds.iter().map(|k| deps.build(*k)).collect(), gap)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub async fn acquire(&self, video_id: &VideoId) -> Result<Transcript> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for (i, strategy) in self.strategies.iter().enumerate() {
            if i > 0 && !self.gap.is_zero() {
                tokio::time::sleep(self.gap).await;
            }
            info!("Fetching transcript for {video_id} via {}", strategy.name());
            match strategy.attempt(video_id).await {
                Ok(transcript) => {
                    info!(
                        "{} succeeded for {video_id} ({} chars)",
                        strategy.name(),
                        transcript.char_count()
                    );
                    return Ok(transcript);
                }
                Err(e) => {
                    warn!("{} failed for {video_id}: {e}", strategy.name());
                    attempts.push(Attempt {
                        strategy: strategy.name(),
                        error: e.to_string(),
                        rate_limited: e.is_rate_limited(),
                        restricted: e.is_restricted(),
                    });
                }
            }
        }

        Err(Error::AcquisitionExhausted(Diagnostic {
            video_id: video_id.clone(),
            attempts,
        }))
    }
}
