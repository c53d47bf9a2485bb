use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::acquire::StrategyKind;
use crate::gemini::DEFAULT_MODEL;
use crate::subtitle::RetryPolicy;
use crate::summarize::PromptLimits;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub model: String,
    pub strategies: Vec<StrategyKind>,
    pub pacing: bool,
    pub ytdlp_path: PathBuf,
    pub summary_chars: usize,
    pub answer_chars: usize,
    pub history_turns: usize,
    pub subtitle_attempts: u32,
    pub request_timeout_secs: u64,
    pub host: String,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let limits = PromptLimits::default();
        Config {
            model: DEFAULT_MODEL.to_string(),
            strategies: StrategyKind::default_chain(),
            pacing: true,
            ytdlp_path: PathBuf::from("yt-dlp"),
            summary_chars: limits.summary_chars,
            answer_chars: limits.answer_chars,
            history_turns: limits.history_turns,
            subtitle_attempts: RetryPolicy::default().max_attempts,
            request_timeout_secs: 30,
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl Config {
    /// Load config from ~/.config/tubemind/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    pub fn limits(&self) -> PromptLimits {
        PromptLimits {
            summary_chars: self.summary_chars,
            answer_chars: self.answer_chars,
            history_turns: self.history_turns,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.subtitle_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("tubemind")
        .join("config.toml")
}

/// Read the model API key from the environment (after `.env` has been loaded).
pub fn api_key() -> Result<String> {
    match std::env::var(API_KEY_VAR) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => eyre::bail!(
            "{API_KEY_VAR} not set.\n\nCreate a .env file with:\n  {API_KEY_VAR}=your_key_here\n\n\
             Get a key from https://aistudio.google.com/app/apikey"
        ),
    }
}
